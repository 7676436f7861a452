//-
// Copyright (c) 2026, The msaq developers
//
// This file is part of msaq.
//
// msaq is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// msaq is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// msaq. If not, see <http://www.gnu.org/licenses/>.

//! Exclusive ownership of a queue directory.
//!
//! Ownership is represented by the `.lock` file in the directory together
//! with an exclusive `flock` on it. The existence check is only a cheap
//! filter so that waiters do not pile up in `flock`; the `flock` is what
//! actually provides mutual exclusion.
//!
//! A waiter may end up locking a `.lock` file that its previous owner has
//! already unlinked. To detect that, after the `flock` succeeds, the path is
//! checked to still refer to the locked inode, and the whole acquisition is
//! retried if it does not. For the same reason, the owner unlinks the file
//! *before* releasing the `flock`: anyone who gets the lock on the old inode
//! afterwards is guaranteed to see that it is stale. This is deliberately the
//! reverse of the usual unlock-then-remove order; unlocking first would let a
//! waiter lock the old inode just before a third process creates a new
//! `.lock`, leaving two owners.
//!
//! If a process holding the lock is killed, the `.lock` file stays behind and
//! every later invocation waits on it until an administrator removes it (or
//! until the configured lock timeout expires).

use std::fs;
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error};
use nix::fcntl::{flock, FlockArg};

use crate::support::error::Error;
use crate::support::file_ops::IgnoreKinds;

pub const LOCK_FILE: &str = ".lock";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A held lock on a queue directory. The lock is released when this is
/// dropped.
#[derive(Debug)]
pub struct QueueLock {
    path: PathBuf,
    file: fs::File,
}

impl QueueLock {
    /// Acquire the lock on `dir`, blocking until it is available.
    ///
    /// If `wait` is given, give up with `Error::LockTimeout` once that much
    /// time has passed without getting the lock.
    pub fn acquire(dir: &Path, wait: Option<Duration>) -> Result<Self, Error> {
        let path = dir.join(LOCK_FILE);
        let deadline = wait.map(|w| Instant::now() + w);

        loop {
            while fs::symlink_metadata(&path).is_ok() {
                check_deadline(deadline, &path)?;
                thread::sleep(POLL_INTERVAL);
            }

            let file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .mode(0o600)
                .open(&path)?;

            loop {
                match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock)
                {
                    Ok(()) => break,
                    Err(nix::errno::Errno::EWOULDBLOCK)
                    | Err(nix::errno::Errno::EINTR) => {
                        check_deadline(deadline, &path)?;
                        thread::sleep(POLL_INTERVAL);
                    },
                    Err(e) => return Err(e.into()),
                }
            }

            if is_same_file(&file, &path)? {
                debug!("Locked {}", path.display());
                return Ok(QueueLock { path, file });
            }

            // The previous owner unlinked the file while we were waiting on
            // it; dropping `file` releases the useless lock.
            debug!("Lost race for {}, retrying", path.display());
        }
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path).ignore_not_found() {
            error!("Failed to remove {}: {}", self.path.display(), e);
        }

        if let Err(e) = flock(self.file.as_raw_fd(), FlockArg::Unlock) {
            error!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

fn check_deadline(deadline: Option<Instant>, path: &Path) -> Result<(), Error> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => {
            Err(Error::LockTimeout(path.to_owned()))
        },
        _ => Ok(()),
    }
}

fn is_same_file(file: &fs::File, path: &Path) -> io::Result<bool> {
    let held = file.metadata()?;
    match fs::symlink_metadata(path) {
        Ok(current) => {
            Ok(held.dev() == current.dev() && held.ino() == current.ino())
        },
        Err(e) if io::ErrorKind::NotFound == e.kind() => Ok(false),
        Err(e) => Err(e),
    }
}
