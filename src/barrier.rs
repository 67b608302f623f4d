// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Termination barrier: the sender keeps the shared objects alive until the
// receiver is gone.
//
// The receiver raises CLOSE_LOCK (undo-tracked) as part of its rendezvous.
// The marker drops back to 0 when the receiver session is finished or, for
// `hold_until_exit`, only when the receiver process exits.

use crate::error::Result;
use crate::sem_set::{Sem, SemOp};
use crate::session::{Receiver, Sender, SessionState};

pub(crate) const fn raise_alive_marker() -> SemOp {
    SemOp::give(Sem::CloseLock).undo()
}

impl<'r> Sender<'r> {
    /// Block until no receiver marker remains. No timeout.
    pub fn await_receiver_exit(&mut self) -> Result<()> {
        self.session.expect("await_receiver_exit", SessionState::Drained)?;
        self.session
            .res
            .sems()
            .transact("Failed close lock", &[SemOp::wait_zero(Sem::CloseLock)])?;
        tracing::info!("receiver gone, releasing sender");
        self.session.advance(SessionState::Released);
        Ok(())
    }
}

impl<'r> Receiver<'r> {
    /// End the session now: role lock, WORKING share and alive marker are
    /// released together, which lets a waiting sender go.
    pub fn finish(self) {
        drop(self);
    }

    /// End the session but leave every undo-tracked adjustment to the kernel,
    /// so the sender is released only once this process has exited.
    ///
    /// Meant to be the last thing a receiver process does.
    pub fn hold_until_exit(mut self) {
        self.session.leave_to_kernel();
    }
}
