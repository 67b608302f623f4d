// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single-slot shared-memory pipe between one sender and one receiver process,
// coordinated by a System V semaphore set.
//
// A session runs through four stages:
//   attach:     take the role lock (WRITER_LOCK / READER_LOCK)
//   rendezvous: both sides confirm each other through WORKING / CLOSE_LOCK
//   stream:     records flow through the mailbox under EMPTY / FULL / MUTEX
//   barrier:    the sender waits for the receiver to be gone

#[cfg(not(unix))]
compile_error!("shmpipe needs System V IPC and only builds on unix targets");

mod platform;

pub mod config;
pub use config::Config;

mod error;
pub use error::{Error, Result};

mod key;
pub use key::ResourceKey;

mod sem_set;
pub use sem_set::{Counters, InitOutcome, Sem, SemOp, SemSet};

mod mailbox;
pub use mailbox::{Mailbox, MailboxAccess, Record, BLOCK_SIZE, MAILBOX_SIZE};

mod resources;
pub use resources::{acquire_resources, Resources};

mod session;
pub use session::{Receiver, Role, Sender, SessionState};

mod transfer;
pub use transfer::TransferStats;

mod barrier;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Run a whole sender session: attach, rendezvous, stream `src`, then wait
/// for the receiver to be gone.
pub fn send<R: Read + ?Sized>(res: &Resources, src: &mut R) -> Result<TransferStats> {
    let mut sender = Sender::attach(res)?;
    sender.rendezvous()?;
    let streamed = sender.stream(src);
    if sender.state() == SessionState::Drained {
        sender.await_receiver_exit()?;
    }
    streamed
}

/// Run a whole receiver session and release it explicitly at the end.
pub fn receive<W: Write + ?Sized>(res: &Resources, sink: &mut W) -> Result<TransferStats> {
    let mut receiver = Receiver::attach(res)?;
    receiver.rendezvous()?;
    let stats = receiver.stream(sink)?;
    receiver.finish();
    Ok(stats)
}

/// Open `path` and send it over the pipe named by `config`.
///
/// The file is opened before any shared object is touched.
pub fn send_file(config: &Config, path: &Path) -> Result<TransferStats> {
    let mut file = File::open(path).map_err(Error::io("open"))?;
    let res = acquire_resources(config)?;
    send(&res, &mut file)
}
