// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use crate::error::Result;
use crate::key::ResourceKey;
use crate::mailbox::Mailbox;
use crate::sem_set::{InitOutcome, SemSet};
use crate::Config;

/// One process's attachment to the semaphore set and mailbox of a key.
///
/// Built once per session by [`acquire_resources`]; sessions borrow it.
pub struct Resources {
    key: ResourceKey,
    sems: SemSet,
    mailbox: Mailbox,
    init_outcome: InitOutcome,
}

/// Derive the key, open-or-create both kernel objects and stamp the initial
/// counter values if nobody has yet.
///
/// Safe to call from both roles at once and again after a crashed run.
pub fn acquire_resources(config: &Config) -> Result<Resources> {
    let key = ResourceKey::derive(config)?;
    let sems = SemSet::open(key)?;
    let init_outcome = sems.initialize()?;
    let mailbox = Mailbox::attach(key)?;
    tracing::debug!(
        key = key.raw(),
        semid = sems.id(),
        shmid = mailbox.id(),
        ?init_outcome,
        "resources acquired"
    );
    Ok(Resources {
        key,
        sems,
        mailbox,
        init_outcome,
    })
}

impl Resources {
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn sems(&self) -> &SemSet {
        &self.sems
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Whether this attachment stamped the initial counter values.
    pub fn init_outcome(&self) -> InitOutcome {
        self.init_outcome
    }

    /// Destroy both kernel objects. Later acquisitions start from scratch.
    ///
    /// Both removals are attempted; the first failure is reported.
    pub fn remove(&self) -> Result<()> {
        let sems = self.sems.remove();
        let mailbox = self.mailbox.remove();
        if let Err(e) = &mailbox {
            tracing::warn!(shmid = self.mailbox.id(), error = %e, "mailbox removal failed");
        }
        sems.and(mailbox)
    }
}
