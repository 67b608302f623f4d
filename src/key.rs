// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Resource Key Registry: turns the well-known marker path into the System V
// key both roles attach with.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;

use crate::error::{Error, Result};
use crate::platform;
use crate::Config;

/// Identifier of the semaphore set and mailbox shared by one sender and one
/// receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey(libc::key_t);

impl ResourceKey {
    /// Ensure the marker file exists (never truncating it) and derive the key.
    ///
    /// Two processes with equal configs always get equal keys as long as the
    /// marker file is not deleted and recreated in between.
    pub fn derive(config: &Config) -> Result<Self> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .mode(0o666)
            .open(config.key_path())
            .map_err(Error::setup("open key file"))?;

        let key = platform::ftok(config.key_path(), config.project_id).map_err(Error::setup("ftok"))?;
        tracing::debug!(path = %config.key_path().display(), key, "derived resource key");
        Ok(Self(key))
    }

    pub fn raw(self) -> libc::key_t {
        self.0
    }
}
