// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use std::io;

use thiserror::Error;

use crate::session::SessionState;

/// Everything that can stop a sender or receiver session.
///
/// An initialization collision with another process is not represented
/// here: it is reported as [`crate::InitOutcome::AlreadyInitialized`].
#[derive(Debug, Error)]
pub enum Error {
    /// Marker file, key derivation or kernel object creation failed.
    #[error("{op}: {source}")]
    Setup {
        op: &'static str,
        #[source]
        source: io::Error,
    },
    /// A semaphore group failed for a reason other than the expected wait.
    #[error("{op}: {source}")]
    Sync {
        op: &'static str,
        #[source]
        source: io::Error,
    },
    /// A non-blocking liveness check found the counterpart gone.
    #[error("{op}: counterpart is no longer attached")]
    PeerGone { op: &'static str },
    /// Reading the input or writing the output failed.
    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("mailbox record length {0} exceeds the block size")]
    CorruptRecord(isize),
    /// The sender published a negative-length record after a read error.
    #[error("sender aborted the stream (record length {0})")]
    SenderAborted(isize),
    #[error("{op} called in session state {state:?}")]
    OutOfOrder {
        op: &'static str,
        state: SessionState,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn setup(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::Setup { op, source }
    }

    pub(crate) fn io(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::Io { op, source }
    }

    /// Classify a failed semaphore group: `EAGAIN` can only come from a
    /// `nowait` liveness op, anything else is a hard failure.
    pub(crate) fn sync(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| {
            if source.raw_os_error() == Some(libc::EAGAIN) {
                Error::PeerGone { op }
            } else {
                Error::Sync { op, source }
            }
        }
    }

    /// Whether this is the counterpart-left case.
    pub fn is_peer_gone(&self) -> bool {
        matches!(self, Error::PeerGone { .. })
    }
}
