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

//! Delivery for a whole spool of per-user queue directories.
//!
//! Each subdirectory of the spool is an independent queue with its own lock.
//! They are handled one after the other. When running as root, each is
//! handled in a forked child which has permanently become the directory's
//! owner, so the queue files and the MSA are only ever touched with that
//! user's privileges.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, Level};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};

use super::delivery::{BatchReport, DeliveryEngine};
use super::msa::Msa;
use super::probe::Reachability;
use super::store::Queue;
use crate::support::error::Error;
use crate::support::mail_log::MailLog;
use crate::support::sysexits::*;
use crate::support::unix_privileges;

pub struct SpoolDelivery<'a> {
    pub network: &'a dyn Reachability,
    pub msa: &'a Msa,
    pub log: &'a dyn MailLog,
    pub lock_wait: Option<Duration>,
    /// Whether to fork and become each mailbox's owner.
    pub as_owner: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpoolReport {
    /// Mailboxes that were flushed without problems.
    pub succeeded: usize,
    /// Mailboxes where something went wrong (already reported).
    pub failed: usize,
    /// Whether nothing was done because the network is down.
    pub offline: bool,
}

impl SpoolDelivery<'_> {
    pub fn deliver_spool(
        &self,
        spool_dir: &Path,
    ) -> Result<SpoolReport, Error> {
        let mut report = SpoolReport::default();

        // Checked before any fork so that every child inherits the answer.
        if !self.network.is_reachable() {
            self.log.log(
                Level::Info,
                None,
                &format!(
                    "network is unreachable, not flushing spool {}",
                    spool_dir.display()
                ),
            )?;
            report.offline = true;
            return Ok(report);
        }

        for mailbox in list_mailboxes(spool_dir)? {
            let log_prefix = format!("spool:{}", mailbox.display());
            let status = if self.as_owner {
                self.in_child(&log_prefix, &mailbox)?
            } else {
                self.deliver_mailbox(&log_prefix, &mailbox)
            };

            if EX_OK == status {
                report.succeeded += 1;
            } else {
                error!("{} Finished with exit status {}", log_prefix, status.0);
                report.failed += 1;
            }
        }

        Ok(report)
    }

    fn deliver_mailbox(&self, log_prefix: &str, mailbox: &Path) -> Sysexit {
        info!("{} Flushing", log_prefix);
        let result = Queue::open(mailbox.to_owned(), self.lock_wait).and_then(
            |queue| {
                DeliveryEngine {
                    queue: &queue,
                    network: self.network,
                    msa: self.msa,
                    log: self.log,
                }
                .deliver_all()
            },
        );

        match result {
            Ok(BatchReport { errors: 0, .. }) => EX_OK,
            Ok(_) => EX_TEMPFAIL,
            Err(e) => {
                error!("{} {}", log_prefix, e);
                e.sysexit()
            },
        }
    }

    fn in_child(
        &self,
        log_prefix: &str,
        mailbox: &Path,
    ) -> Result<Sysexit, Error> {
        // Safety: the child only flushes this one mailbox and then exits
        // without returning to the caller.
        match unsafe { fork() }? {
            ForkResult::Child => {
                let status =
                    match unix_privileges::assume_owner(log_prefix, mailbox) {
                        Ok(()) => self.deliver_mailbox(log_prefix, mailbox),
                        Err(status) => status,
                    };
                status.exit()
            },

            ForkResult::Parent { child } => match waitpid(child, None)? {
                WaitStatus::Exited(_, code) => Ok(Sysexit(code)),
                WaitStatus::Signaled(_, signal, _) => {
                    error!("{} Killed by {:?}", log_prefix, signal);
                    Ok(EX_SOFTWARE)
                },
                status => {
                    error!(
                        "{} Unexpected wait status {:?}",
                        log_prefix, status
                    );
                    Ok(EX_SOFTWARE)
                },
            },
        }
    }
}

/// The non-hidden subdirectories of `spool_dir`, in name order.
fn list_mailboxes(spool_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut mailboxes = Vec::new();
    for entry in fs::read_dir(spool_dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            mailboxes.push(entry.path());
        }
    }

    mailboxes.sort();
    Ok(mailboxes)
}
