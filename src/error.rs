// Error taxonomy for a single run. Every variant is terminal: the runner
// never retries, it reports and stops.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing API key, bad flag combination, missing input file. Always
    /// raised before the first network call.
    #[error("{0}")]
    Config(String),

    /// The service answered with a status >= 400.
    #[error("{action} failed: {status} - {body}")]
    Http {
        action: &'static str,
        status: u16,
        body: String,
    },

    /// The job reached the service's failure state.
    #[error("video generation {job} failed: {message}")]
    JobFailed { job: String, message: String },

    #[error("{}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection errors and undecodable bodies.
    #[error("request failed")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response that lacks a field the workflow needs.
    #[error("unexpected response from {action}: {detail}")]
    Decode {
        action: &'static str,
        detail: String,
    },
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
