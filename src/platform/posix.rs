// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX implementation of the System V primitives the pipe is built on:
// key derivation (ftok), semaphore sets (semget/semop/semctl) and shared
// memory segments (shmget/shmat/shmdt/shmctl).

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

/// Permissions for every kernel object created here (rw for everyone, like
/// the marker file that names them).
const PERMS: libc::c_int = 0o666;

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive a System V IPC key from an existing path and a project id.
pub fn ftok(path: &Path, project_id: i32) -> io::Result<libc::key_t> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let key = unsafe { libc::ftok(c_path.as_ptr(), project_id as libc::c_int) };
    if key == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(key)
}

// ---------------------------------------------------------------------------
// PlatformSemSet: System V semaphore set
// ---------------------------------------------------------------------------

/// A handle to a kernel semaphore set. Holds no process-local state besides
/// the id, so dropping it leaves the set (and any `SEM_UNDO` adjustments)
/// untouched.
#[derive(Debug)]
pub struct PlatformSemSet {
    id: libc::c_int,
    nsems: usize,
}

impl PlatformSemSet {
    /// Open the set for `key`, creating it with `nsems` zeroed counters if it
    /// does not exist yet.
    pub fn open_or_create(key: libc::key_t, nsems: usize) -> io::Result<Self> {
        let id = unsafe { libc::semget(key, nsems as libc::c_int, libc::IPC_CREAT | PERMS) };
        if id == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { id, nsems })
    }

    pub fn id(&self) -> libc::c_int {
        self.id
    }

    /// Apply `ops` as one indivisible group.
    ///
    /// Blocks until every op can proceed unless one of the blocking ops
    /// carries `IPC_NOWAIT`, in which case `EAGAIN` is returned. `EINTR` is
    /// retried: the kernel applies nothing when a sleeping group is
    /// interrupted.
    pub fn semop(&self, ops: &mut [libc::sembuf]) -> io::Result<()> {
        loop {
            let ret = unsafe { libc::semop(self.id, ops.as_mut_ptr(), ops.len() as libc::size_t) };
            if ret == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
    }

    pub fn get_val(&self, num: u16) -> io::Result<i32> {
        let ret = unsafe { libc::semctl(self.id, num as libc::c_int, libc::GETVAL) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(ret)
    }

    /// Overwrite one counter. Also clears every process's undo entry for it.
    pub fn set_val(&self, num: u16, val: i32) -> io::Result<()> {
        let ret = unsafe {
            libc::semctl(self.id, num as libc::c_int, libc::SETVAL, val as libc::c_int)
        };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Read every counter in a single kernel call.
    pub fn get_all(&self) -> io::Result<Vec<u16>> {
        let mut vals = vec![0 as libc::c_ushort; self.nsems];
        let ret = unsafe { libc::semctl(self.id, 0, libc::GETALL, vals.as_mut_ptr()) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(vals)
    }

    /// Destroy the kernel object. Every process blocked on it wakes with `EIDRM`.
    pub fn remove(&self) -> io::Result<()> {
        let ret = unsafe { libc::semctl(self.id, 0, libc::IPC_RMID) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PlatformShm: System V shared memory segment
// ---------------------------------------------------------------------------

pub struct PlatformShm {
    id: libc::c_int,
    mem: *mut u8,
}

// Safety: the shared memory region is process-shared by design.
unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

impl PlatformShm {
    /// Open the segment for `key`, creating it with `size` zeroed bytes if it
    /// does not exist yet, and attach it into this process.
    pub fn acquire(key: libc::key_t, size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0"));
        }
        let id = unsafe { libc::shmget(key, size as libc::size_t, libc::IPC_CREAT | PERMS) };
        if id == -1 {
            return Err(io::Error::last_os_error());
        }

        let mem = unsafe { libc::shmat(id, ptr::null(), 0) };
        if mem as isize == -1 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            id,
            mem: mem as *mut u8,
        })
    }

    pub fn id(&self) -> libc::c_int {
        self.id
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    /// Mark the segment for destruction once the last process detaches.
    pub fn remove(&self) -> io::Result<()> {
        let ret = unsafe { libc::shmctl(self.id, libc::IPC_RMID, ptr::null_mut()) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        if self.mem.is_null() {
            return;
        }
        // The segment itself persists; only this process's mapping goes away.
        unsafe { libc::shmdt(self.mem as *const libc::c_void) };
    }
}
