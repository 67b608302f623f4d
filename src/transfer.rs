// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bounded single-slot producer/consumer loops over the mailbox.
//
// EMPTY and FULL form a capacity-1 buffer: the sender is never more than one
// record ahead of the receiver. MUTEX keeps a half-written record invisible.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::mailbox::Record;
use crate::sem_set::{Sem, SemOp};
use crate::session::{Receiver, Sender, SessionState};

/// Counters reported by a finished stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    /// Records carrying data (the end-of-stream record is not counted).
    pub records: u64,
    pub bytes: u64,
}

impl TransferStats {
    fn add(&mut self, n: usize) {
        self.records += 1;
        self.bytes += n as u64;
    }
}

impl<'r> Sender<'r> {
    /// Publish `src` one block at a time, ending with a zero-length record.
    ///
    /// A read error is published as a negative-length record before it is
    /// returned, so the receiver stops too. The session is `Drained` in both
    /// cases and [`Sender::await_receiver_exit`] should still be called.
    pub fn stream<R: Read + ?Sized>(&mut self, src: &mut R) -> Result<TransferStats> {
        self.session.expect("stream", SessionState::Rendezvoused)?;
        self.session.advance(SessionState::Streaming);

        let res = self.session.res;
        let sems = res.sems();
        let alive = self.session.peer_alive();
        let mut stats = TransferStats::default();

        loop {
            sems.transact("semop empty down", &[alive, SemOp::take(Sem::Empty)])?;

            let mut access = res.mailbox().lock(sems, alive.sem)?;
            let filled = access.fill_from(src);
            access.release()?;

            sems.transact("semop full up", &[alive, SemOp::give(Sem::Full)])?;

            match filled {
                Ok(0) => break,
                Ok(n) => {
                    tracing::trace!(len = n, "record published");
                    stats.add(n);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input read failed, stream aborted");
                    self.session.advance(SessionState::Drained);
                    return Err(Error::Io { op: "read", source: e });
                }
            }
        }

        tracing::debug!(records = stats.records, bytes = stats.bytes, "end of stream published");
        self.session.advance(SessionState::Drained);
        Ok(stats)
    }
}

/// What one consumer iteration decided, computed while MUTEX is held.
enum Step {
    Wrote(usize),
    End,
    Aborted(isize),
    Failed(Error),
}

impl<'r> Receiver<'r> {
    /// Copy every record to `sink` until the end-of-stream record.
    ///
    /// Returns [`Error::SenderAborted`] if the stream ended on a read error.
    pub fn stream<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<TransferStats> {
        self.session.expect("stream", SessionState::Rendezvoused)?;
        self.session.advance(SessionState::Streaming);

        let res = self.session.res;
        let sems = res.sems();
        let alive = self.session.peer_alive();
        let mut stats = TransferStats::default();

        loop {
            sems.transact("semop full down", &[alive, SemOp::take(Sem::Full)])?;

            let access = res.mailbox().lock(sems, alive.sem)?;
            let step = match access.record() {
                Ok(Record::Data(bytes)) => match sink.write_all(bytes) {
                    Ok(()) => Step::Wrote(bytes.len()),
                    Err(e) => Step::Failed(Error::Io { op: "write", source: e }),
                },
                Ok(Record::End) => Step::End,
                Ok(Record::Aborted(n)) => Step::Aborted(n),
                Err(e) => Step::Failed(e),
            };
            access.release()?;

            sems.transact("semop empty up", &[alive, SemOp::give(Sem::Empty)])?;

            match step {
                Step::Wrote(n) => {
                    tracing::trace!(len = n, "record consumed");
                    stats.add(n);
                }
                Step::End => break,
                Step::Aborted(n) => {
                    tracing::warn!(len = n, "sender aborted the stream");
                    self.session.advance(SessionState::Drained);
                    return Err(Error::SenderAborted(n));
                }
                Step::Failed(e) => return Err(e),
            }
        }

        sink.flush().map_err(Error::io("flush"))?;
        tracing::debug!(records = stats.records, bytes = stats.bytes, "end of stream consumed");
        self.session.advance(SessionState::Drained);
        Ok(stats)
    }
}
