// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The eight named counters that coordinate one sender and one receiver, and
// the atomic-group transaction used for every access to them.

use std::fmt;
use std::ops::Index;

use crate::error::{Error, Result};
use crate::key::ResourceKey;
use crate::platform::PlatformSemSet;

/// Names of the counters in the set, in kernel index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Sem {
    /// 1 = no receiver attached, 0 = a receiver holds it.
    ReaderLock = 0,
    /// 1 = no sender attached, 0 = a sender holds it.
    WriterLock = 1,
    /// Receiver's "still alive" marker; 0 outside a receiver session.
    CloseLock = 2,
    /// Session rendezvous counter.
    Working = 3,
    /// Exclusive access to the mailbox.
    Mutex = 4,
    /// Free mailbox slots (capacity 1).
    Empty = 5,
    /// Unread mailbox records (capacity 1).
    Full = 6,
    /// 0 until the set has been stamped with its initial values.
    Init = 7,
}

impl Sem {
    pub const COUNT: usize = 8;

    pub const ALL: [Sem; Sem::COUNT] = [
        Sem::ReaderLock,
        Sem::WriterLock,
        Sem::CloseLock,
        Sem::Working,
        Sem::Mutex,
        Sem::Empty,
        Sem::Full,
        Sem::Init,
    ];

    pub const fn index(self) -> u16 {
        self as u16
    }
}

/// One step of an atomic group.
///
/// `delta == 0` waits for the counter to be zero, a negative delta waits
/// until the counter can be decreased by that much, a positive delta never
/// waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemOp {
    pub sem: Sem,
    pub delta: i16,
    /// Rolled back by the kernel when the calling process exits.
    pub undo: bool,
    /// Fail the whole group with `EAGAIN` instead of waiting on this step.
    pub nowait: bool,
}

impl SemOp {
    pub const fn adjust(sem: Sem, delta: i16) -> Self {
        Self {
            sem,
            delta,
            undo: false,
            nowait: false,
        }
    }

    pub const fn wait_zero(sem: Sem) -> Self {
        Self::adjust(sem, 0)
    }

    pub const fn take(sem: Sem) -> Self {
        Self::adjust(sem, -1)
    }

    pub const fn give(sem: Sem) -> Self {
        Self::adjust(sem, 1)
    }

    pub const fn undo(mut self) -> Self {
        self.undo = true;
        self
    }

    pub const fn nowait(mut self) -> Self {
        self.nowait = true;
        self
    }

    /// The same step with the opposite delta and flags kept, so an undo
    /// adjustment is cancelled rather than doubled.
    pub const fn inverse(mut self) -> Self {
        self.delta = -self.delta;
        self
    }

    fn to_raw(self) -> libc::sembuf {
        let mut flags = 0;
        if self.undo {
            flags |= libc::SEM_UNDO;
        }
        if self.nowait {
            flags |= libc::IPC_NOWAIT;
        }
        libc::sembuf {
            sem_num: self.sem.index() as libc::c_ushort,
            sem_op: self.delta as libc::c_short,
            sem_flg: flags as libc::c_short,
        }
    }
}

/// Result of [`SemSet::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// This call stamped the initial values.
    Stamped,
    /// Some earlier call already did; nothing was changed.
    AlreadyInitialized,
}

/// All eight counter values, read in one kernel call.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Counters([u16; Sem::COUNT]);

impl Counters {
    pub fn get(&self, sem: Sem) -> u16 {
        self.0[sem.index() as usize]
    }
}

impl Index<Sem> for Counters {
    type Output = u16;

    fn index(&self, sem: Sem) -> &u16 {
        &self.0[sem.index() as usize]
    }
}

impl fmt::Debug for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        for sem in Sem::ALL {
            m.entry(&sem, &self.get(sem));
        }
        m.finish()
    }
}

/// This process's handle to the shared semaphore set.
#[derive(Debug)]
pub struct SemSet {
    inner: PlatformSemSet,
}

impl SemSet {
    /// Open the set for `key`, creating it (all counters zero) if needed.
    pub fn open(key: ResourceKey) -> Result<Self> {
        let inner = PlatformSemSet::open_or_create(key.raw(), Sem::COUNT).map_err(Error::setup("semget"))?;
        Ok(Self { inner })
    }

    /// Stamp the initial values exactly once per kernel object.
    ///
    /// Test-and-set in one group: only if INIT is 0 are READER_LOCK,
    /// WRITER_LOCK, MUTEX and EMPTY raised to 1 and INIT set to 1. A caller
    /// that finds INIT already 1 changes nothing.
    pub fn initialize(&self) -> Result<InitOutcome> {
        let group = [
            SemOp::give(Sem::ReaderLock),
            SemOp::give(Sem::WriterLock),
            SemOp::give(Sem::Mutex),
            SemOp::give(Sem::Empty),
            SemOp::wait_zero(Sem::Init).nowait(),
            SemOp::give(Sem::Init).nowait(),
        ];
        match self.apply(&group) {
            Ok(()) => {
                tracing::info!(semid = self.inner.id(), "semaphore set initialized");
                Ok(InitOutcome::Stamped)
            }
            Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => {
                tracing::info!(semid = self.inner.id(), "semaphore set is already initialized");
                Ok(InitOutcome::AlreadyInitialized)
            }
            Err(source) => Err(Error::Setup {
                op: "semaphore initialization",
                source,
            }),
        }
    }

    /// Run `ops` as one atomic group. `op` names the step in diagnostics.
    ///
    /// Blocks with no timeout. A failing `nowait` step surfaces as
    /// [`Error::PeerGone`].
    pub fn transact(&self, op: &'static str, ops: &[SemOp]) -> Result<()> {
        self.apply(ops).map_err(Error::sync(op))
    }

    fn apply(&self, ops: &[SemOp]) -> std::io::Result<()> {
        let mut raw: Vec<libc::sembuf> = ops.iter().map(|o| o.to_raw()).collect();
        self.inner.semop(&mut raw)
    }

    pub fn value(&self, sem: Sem) -> Result<u16> {
        let v = self
            .inner
            .get_val(sem.index())
            .map_err(|source| Error::Sync { op: "semctl getval", source })?;
        Ok(v as u16)
    }

    /// Overwrite a counter outside of any group. Only used while no other
    /// process can be touching it.
    pub fn set_value(&self, sem: Sem, val: u16) -> Result<()> {
        self.inner
            .set_val(sem.index(), val as i32)
            .map_err(|source| Error::Sync { op: "semctl setval", source })
    }

    pub fn snapshot(&self) -> Result<Counters> {
        let vals = self
            .inner
            .get_all()
            .map_err(|source| Error::Sync { op: "semctl getall", source })?;
        let mut out = [0u16; Sem::COUNT];
        out.copy_from_slice(&vals[..Sem::COUNT]);
        Ok(Counters(out))
    }

    pub fn id(&self) -> i32 {
        self.inner.id()
    }

    /// Destroy the kernel object for every process.
    pub fn remove(&self) -> Result<()> {
        self.inner
            .remove()
            .map_err(|source| Error::Sync { op: "semctl rmid", source })
    }
}
