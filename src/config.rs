// Configuration: where the API key and base URL come from.
//
// Precedence is CLI flag > process environment > `.env` files. The `.env`
// files only fill in variables that are not already set, so loading them
// before argument parsing keeps that order.

use std::path::PathBuf;

use log::debug;

use crate::error::{Error, Result};
use crate::job::Service;

pub const API_KEY_ENV: &str = "HEDRA_API_KEY";
pub const BASE_URL_ENV: &str = "HEDRA_BASE_URL";

/// Directory under the user's config dir that may hold a `.env` file.
const CONFIG_DIR_NAME: &str = "hedra-cli";

/// Resolved settings for one run.
#[derive(Clone, Debug)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub service: Service,
    pub canary: bool,
}

impl Settings {
    /// Builds settings from already-merged flag/env values. A missing or
    /// blank key is a configuration error.
    pub fn resolve(
        api_key: Option<&str>,
        base_url: Option<&str>,
        service: Service,
        canary: bool,
    ) -> Result<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "{} not found: pass --api-key, set it in the environment or in a .env file",
                    API_KEY_ENV
                ))
            })?;
        let base_url = base_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| service.default_base_url());

        Ok(Settings {
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            service,
            canary,
        })
    }
}

/// Candidate `.env` files, in load order.
pub fn env_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(".env")];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join(CONFIG_DIR_NAME).join(".env"));
    }
    files
}

/// Loads every `.env` file that exists. Variables already present in the
/// environment are left untouched, and earlier files win over later ones.
pub fn load_env_files() {
    for path in env_files() {
        match dotenvy::from_path(&path) {
            Ok(()) => debug!("loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("ignoring {}: {}", path.display(), e),
        }
    }
}
