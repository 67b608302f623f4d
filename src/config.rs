// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Where the shared Resource Key comes from.
//
// Lookup order for each field:
//   1. SHMPIPE_KEY_PATH / SHMPIPE_PROJECT_ID env vars (explicit override)
//   2. Built-in defaults

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Marker file both roles derive the key from unless overridden.
pub const DEFAULT_KEY_PATH: &str = "/tmp/shmpipe_key";

/// Project id mixed into the key (only the low 8 bits are significant).
pub const DEFAULT_PROJECT_ID: i32 = 1;

pub const KEY_PATH_ENV: &str = "SHMPIPE_KEY_PATH";
pub const PROJECT_ID_ENV: &str = "SHMPIPE_PROJECT_ID";

/// Identifies which semaphore set and mailbox a process attaches to.
///
/// Sender and receiver must be started with equal configs to meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub key_path: PathBuf,
    pub project_id: i32,
}

impl Config {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            project_id: DEFAULT_PROJECT_ID,
        }
    }

    pub fn with_project_id(mut self, project_id: i32) -> Self {
        self.project_id = project_id;
        self
    }

    /// Defaults, overridden by the environment. Unparsable project ids fall
    /// back to the default with a warning, since the two roles may then end
    /// up on different pipes.
    pub fn from_env() -> Self {
        let key_path = match std::env::var_os(KEY_PATH_ENV) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => PathBuf::from(DEFAULT_KEY_PATH),
        };
        let project_id = match std::env::var_os(PROJECT_ID_ENV) {
            None => DEFAULT_PROJECT_ID,
            Some(raw) => parse_project_id(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    value = ?raw,
                    default = DEFAULT_PROJECT_ID,
                    "SHMPIPE_PROJECT_ID is not an integer, using the default project id"
                );
                DEFAULT_PROJECT_ID
            }),
        };
        Self {
            key_path,
            project_id,
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }
}

fn parse_project_id(raw: &OsStr) -> Option<i32> {
    raw.to_str()?.trim().parse().ok()
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PATH)
    }
}
