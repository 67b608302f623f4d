// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Role exclusivity and the rendezvous handshake.
//
// Every counter adjustment a session makes with SEM_UNDO is recorded in the
// session and reversed when it is dropped, so the kernel's exit-time rollback
// only has to cover processes that are killed.

use crate::error::{Error, Result};
use crate::resources::Resources;
use crate::sem_set::{Sem, SemOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// The lock this role holds for the whole session.
    pub const fn own_lock(self) -> Sem {
        match self {
            Role::Sender => Sem::WriterLock,
            Role::Receiver => Sem::ReaderLock,
        }
    }

    /// The counterpart's lock; 0 while the counterpart is attached.
    pub const fn peer_lock(self) -> Sem {
        match self {
            Role::Sender => Sem::ReaderLock,
            Role::Receiver => Sem::WriterLock,
        }
    }
}

/// Where a session is in its lifecycle. Operations are only accepted in the
/// state that precedes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Role lock held, counterpart not seen yet.
    Locked,
    /// Both sides confirmed each other.
    Rendezvoused,
    /// Inside the transfer loop.
    Streaming,
    /// End-of-stream record published (sender) or consumed (receiver).
    Drained,
    /// Sender only: the receiver has exited.
    Released,
}

/// State shared by both roles.
pub(crate) struct Session<'r> {
    pub(crate) res: &'r Resources,
    pub(crate) role: Role,
    pub(crate) state: SessionState,
    /// Undo-tracked adjustments this session currently owns.
    held: Vec<SemOp>,
}

impl<'r> Session<'r> {
    /// Wait until no earlier session is still registered in WORKING, then
    /// take this role's lock.
    fn lock(res: &'r Resources, role: Role, op: &'static str) -> Result<Self> {
        let take = SemOp::take(role.own_lock()).undo();
        res.sems().transact(op, &[SemOp::wait_zero(Sem::Working), take])?;
        tracing::info!(?role, "role lock acquired");
        Ok(Self {
            res,
            role,
            state: SessionState::Locked,
            held: vec![take],
        })
    }

    pub(crate) fn expect(&self, op: &'static str, state: SessionState) -> Result<()> {
        if self.state != state {
            return Err(Error::OutOfOrder {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    pub(crate) fn advance(&mut self, state: SessionState) {
        tracing::debug!(role = ?self.role, from = ?self.state, to = ?state, "session state");
        self.state = state;
    }

    /// Run a group and remember the undo-tracked steps it applied.
    pub(crate) fn transact_holding(&mut self, op: &'static str, ops: &[SemOp]) -> Result<()> {
        self.res.sems().transact(op, ops)?;
        self.held.extend(ops.iter().copied().filter(|o| o.undo));
        Ok(())
    }

    /// Liveness check folded into every transfer step.
    pub(crate) fn peer_alive(&self) -> SemOp {
        SemOp::wait_zero(self.role.peer_lock()).nowait()
    }

    /// Hand every held adjustment to the kernel; they are reversed only when
    /// this process exits.
    pub(crate) fn leave_to_kernel(&mut self) {
        self.held.clear();
    }

    fn release(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let group: Vec<SemOp> = self.held.drain(..).map(|o| o.inverse().nowait()).collect();
        if self.res.sems().transact("session release", &group).is_ok() {
            tracing::debug!(role = ?self.role, "session released");
            return;
        }
        // Someone overwrote a counter under us; release what still can be.
        for op in group {
            if let Err(e) = self.res.sems().transact("session release", &[op]) {
                tracing::warn!(role = ?self.role, sem = ?op.sem, error = %e, "could not release counter");
            }
        }
    }
}

impl<'r> Drop for Session<'r> {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// The single active sender of a key.
pub struct Sender<'r> {
    pub(crate) session: Session<'r>,
}

impl<'r> Sender<'r> {
    /// Take WRITER_LOCK and reset the buffer counters for a fresh session.
    ///
    /// Blocks while another sender holds the lock or while a previous
    /// session is still winding down.
    pub fn attach(res: &'r Resources) -> Result<Self> {
        let session = Session::lock(res, Role::Sender, "Failed writer lock")?;
        let sems = res.sems();
        sems.set_value(Sem::Empty, 1)?;
        sems.set_value(Sem::Mutex, 1)?;
        sems.set_value(Sem::Full, 0)?;
        Ok(Self { session })
    }

    /// Wait for a receiver, register the session in WORKING, then wait for
    /// the receiver's alive marker.
    ///
    /// No timeout: a sender without a receiver waits forever.
    pub fn rendezvous(&mut self) -> Result<()> {
        self.session.expect("rendezvous", SessionState::Locked)?;
        self.session.transact_holding(
            "Failed reader lock wait",
            &[SemOp::wait_zero(Sem::ReaderLock), SemOp::give(Sem::Working).undo()],
        )?;
        let alive = self.session.peer_alive();
        self.session.transact_holding(
            "Failed receiver handshake",
            &[alive, SemOp::take(Sem::CloseLock), SemOp::give(Sem::CloseLock)],
        )?;
        tracing::info!("receiver attached");
        self.session.advance(SessionState::Rendezvoused);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// The single active receiver of a key.
pub struct Receiver<'r> {
    pub(crate) session: Session<'r>,
}

impl<'r> Receiver<'r> {
    /// Take READER_LOCK. Blocks while another receiver holds it or while a
    /// previous session is still winding down.
    pub fn attach(res: &'r Resources) -> Result<Self> {
        let session = Session::lock(res, Role::Receiver, "Failed reader lock")?;
        Ok(Self { session })
    }

    /// Wait for the sender's WORKING signal and answer it in one group.
    ///
    /// The group consumes the signal, checks it was the only one, puts it
    /// back next to the receiver's own undo-tracked share, raises the alive
    /// marker and verifies WRITER_LOCK is still held. If the sender died
    /// meanwhile the group fails without effect.
    pub fn rendezvous(&mut self) -> Result<()> {
        self.session.expect("rendezvous", SessionState::Locked)?;
        let alive = self.session.peer_alive();
        self.session.transact_holding(
            "Failed reader lock wait",
            &[
                SemOp::take(Sem::Working),
                SemOp::wait_zero(Sem::Working),
                SemOp::give(Sem::Working),
                SemOp::give(Sem::Working).undo(),
                crate::barrier::raise_alive_marker(),
                alive,
            ],
        )?;
        tracing::info!("sender attached");
        self.session.advance(SessionState::Rendezvoused);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_mirrored() {
        assert_eq!(Role::Sender.own_lock(), Role::Receiver.peer_lock());
        assert_eq!(Role::Receiver.own_lock(), Role::Sender.peer_lock());
    }
}
