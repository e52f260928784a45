// Library root
// -----------
// This crate exposes the pieces the `hedra-cli` binary wires together.
//
// Module responsibilities:
// - `cli`: flag definitions and the checks that run before any request.
// - `config`: API key and base URL resolution (flags, environment, .env).
// - `api`: blocking HTTP client for both dialects of the service.
// - `runner`: upload, submit, poll and download for one job.
// - `ui`: colored output, the poll spinner and the voice table.
//
// `runner` only sees the `api::VideoApi` trait, so the workflow can be
// exercised without a network.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod logger;
pub mod runner;
pub mod ui;

pub use error::{Error, Result};
