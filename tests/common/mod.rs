// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared fixture: every test gets its own marker file, and therefore its own
// semaphore set and mailbox, which are destroyed again at the end.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use shmpipe::{acquire_resources, Config, Resources, Sem};
use tempfile::TempDir;

pub struct Pipe {
    _dir: TempDir,
    pub config: Config,
}

/// ftok keeps only 16 bits of the marker's inode, so two live tempdirs can
/// hash alike; a distinct project id per pipe separates them.
fn next_project_id() -> i32 {
    static COUNTER: AtomicI32 = AtomicI32::new(0);
    // ftok uses the low 8 bits and they must not be zero.
    COUNTER.fetch_add(1, Ordering::Relaxed) % 255 + 1
}

impl Pipe {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::new(dir.path().join("key")).with_project_id(next_project_id());
        // Objects left behind by an earlier run that hashed to the same key.
        purge(&config);
        Self { _dir: dir, config }
    }

    pub fn resources(&self) -> Resources {
        acquire_resources(&self.config).expect("acquire resources")
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        purge(&self.config);
    }
}

fn purge(config: &Config) {
    if let Ok(res) = acquire_resources(config) {
        let _ = res.remove();
    }
}

/// Deterministic, non-repeating-per-block test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Poll a counter until it reaches `want` or `timeout` passes.
pub fn wait_for_value(res: &Resources, sem: Sem, want: u16, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if res.sems().value(sem).expect("getval") == want {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
