// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single-record shared memory mailbox and the RAII guard that holds MUTEX
// while the record is read or written.

use std::io::{self, Read};
use std::ptr;

use crate::error::{Error, Result};
use crate::key::ResourceKey;
use crate::platform::PlatformShm;
use crate::sem_set::{Sem, SemOp, SemSet};

/// Payload capacity of one record.
pub const BLOCK_SIZE: usize = 1024;

/// Shared layout: a signed length followed by the payload bytes.
#[repr(C)]
struct Slot {
    len: isize,
    payload: [u8; BLOCK_SIZE],
}

/// Size of the shared memory segment.
pub const MAILBOX_SIZE: usize = std::mem::size_of::<Slot>();

/// What the receiver finds in the mailbox.
#[derive(Debug, PartialEq, Eq)]
pub enum Record<'a> {
    Data(&'a [u8]),
    /// Zero length: the input ended normally.
    End,
    /// Negative length: the sender failed to read its input.
    Aborted(isize),
}

/// This process's attachment to the shared mailbox segment.
///
/// The segment outlives every session; only the mapping is dropped.
pub struct Mailbox {
    shm: PlatformShm,
}

impl Mailbox {
    pub fn attach(key: ResourceKey) -> Result<Self> {
        let shm = PlatformShm::acquire(key.raw(), MAILBOX_SIZE).map_err(Error::setup("shmget/shmat"))?;
        Ok(Self { shm })
    }

    fn slot(&self) -> *mut Slot {
        self.shm.as_mut_ptr() as *mut Slot
    }

    /// Acquire MUTEX, failing instead of waiting if `liveness` shows the
    /// counterpart is no longer attached.
    pub fn lock<'a>(&'a self, sems: &'a SemSet, liveness: Sem) -> Result<MailboxAccess<'a>> {
        sems.transact(
            "semop mutex down",
            &[SemOp::wait_zero(liveness).nowait(), SemOp::take(Sem::Mutex)],
        )?;
        Ok(MailboxAccess {
            mailbox: self,
            sems,
            liveness,
            held: true,
        })
    }

    /// Length field as currently stored, read without MUTEX. Diagnostics only.
    pub fn peek_len(&self) -> isize {
        unsafe { ptr::read_volatile(ptr::addr_of!((*self.slot()).len)) }
    }

    pub fn id(&self) -> i32 {
        self.shm.id()
    }

    /// Mark the segment for destruction once every process has detached.
    pub fn remove(&self) -> Result<()> {
        self.shm
            .remove()
            .map_err(|source| Error::Sync { op: "shmctl rmid", source })
    }
}

/// RAII guard: MUTEX is held from [`Mailbox::lock`] until
/// [`MailboxAccess::release`] (or drop).
pub struct MailboxAccess<'a> {
    mailbox: &'a Mailbox,
    sems: &'a SemSet,
    liveness: Sem,
    held: bool,
}

impl<'a> MailboxAccess<'a> {
    /// Read at most one block from `src` into the payload and store the byte
    /// count as the record length.
    ///
    /// On a read error the length becomes -1 so the record still terminates
    /// the stream, and the error is returned.
    pub fn fill_from<R: Read + ?Sized>(&mut self, src: &mut R) -> io::Result<usize> {
        let slot = self.mailbox.slot();
        let payload = unsafe { &mut *ptr::addr_of_mut!((*slot).payload) };
        let res = loop {
            match src.read(&mut payload[..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        let len = match &res {
            Ok(n) => *n as isize,
            Err(_) => -1,
        };
        unsafe { ptr::write_volatile(ptr::addr_of_mut!((*slot).len), len) };
        res
    }

    /// Current record.
    pub fn record(&self) -> Result<Record<'_>> {
        let slot = self.mailbox.slot();
        let len = unsafe { ptr::read_volatile(ptr::addr_of!((*slot).len)) };
        match len {
            0 => Ok(Record::End),
            n if n < 0 => Ok(Record::Aborted(n)),
            n if n as usize > BLOCK_SIZE => Err(Error::CorruptRecord(n)),
            n => {
                let payload = unsafe { &*ptr::addr_of!((*slot).payload) };
                Ok(Record::Data(&payload[..n as usize]))
            }
        }
    }

    /// Give MUTEX back, with the same liveness check as the acquisition.
    ///
    /// When the check fails MUTEX stays taken; the next sender resets it.
    pub fn release(mut self) -> Result<()> {
        self.held = false;
        self.sems.transact(
            "semop mutex up",
            &[SemOp::wait_zero(self.liveness).nowait(), SemOp::give(Sem::Mutex)],
        )
    }
}

impl<'a> Drop for MailboxAccess<'a> {
    fn drop(&mut self) {
        if self.held {
            let _ = self.sems.transact("semop mutex up", &[SemOp::give(Sem::Mutex)]);
        }
    }
}
