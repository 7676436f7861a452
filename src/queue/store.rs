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

//! The on-disk queue.
//!
//! # Layout
//!
//! A queue directory holds, for each queued message with ID `X`:
//!
//! - `X.eml`: the raw message, exactly as submitted.
//! - `X.msaargs`: the per-message MSA arguments (see `msaargs`).
//!
//! plus the `.lock` file while some process owns the directory. A message is
//! in the queue if and only if both of its files exist. A lone `.eml` or
//! `.msaargs` file indicates corruption (most likely a crash during
//! `enqueue`) and is reported every time the directory is listed, but
//! otherwise left alone for a human to deal with.
//!
//! # Writes
//!
//! Both files are written through temporary files which are renamed into
//! place, so a file is either absent or complete. The `.eml` file is renamed
//! in without overwriting, which is also how an ID is claimed; the
//! `.msaargs` file follows. Files are never modified after creation.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::iter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::prelude::*;
use log::{error, warn};

use super::lock::QueueLock;
use super::model::*;
use super::msaargs;
use crate::support::error::Error;
use crate::support::file_ops::{self, ErrorTransforms};

pub const BODY_EXTENSION: &str = "eml";
pub const ARGS_EXTENSION: &str = "msaargs";

const FILE_MODE: u32 = 0o600;

/// The result of scanning a queue directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
    /// IDs with both files present.
    pub present: BTreeSet<QueueId>,
    /// IDs with a `.eml` but no `.msaargs` file.
    pub body_only: BTreeSet<QueueId>,
    /// IDs with a `.msaargs` but no `.eml` file.
    pub args_only: BTreeSet<QueueId>,
}

/// A queue directory, held under its lock for as long as this value lives.
#[derive(Debug)]
pub struct Queue {
    root: PathBuf,
    _lock: QueueLock,
}

impl Queue {
    /// Lock the queue directory at `root` and open it.
    ///
    /// See `QueueLock::acquire` for the meaning of `wait`.
    pub fn open(root: PathBuf, wait: Option<Duration>) -> Result<Self, Error> {
        let lock = QueueLock::acquire(&root, wait)?;
        Ok(Queue { root, _lock: lock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn body_path(&self, id: QueueId) -> PathBuf {
        self.root.join(format!("{}.{}", id, BODY_EXTENSION))
    }

    fn args_path(&self, id: QueueId) -> PathBuf {
        self.root.join(format!("{}.{}", id, ARGS_EXTENSION))
    }

    /// Add a message to the queue, returning its new ID.
    pub fn enqueue(
        &self,
        body: &[u8],
        args: &[String],
    ) -> Result<QueueId, Error> {
        self.enqueue_with_ids(
            &mut iter::repeat_with(QueueId::random),
            body,
            args,
            &|path: &Path, data: &[u8]| {
                file_ops::spit(&self.root, path, FILE_MODE, data)
            },
        )
    }

    fn enqueue_with_ids(
        &self,
        ids: &mut dyn Iterator<Item = QueueId>,
        body: &[u8],
        args: &[String],
        write: &dyn Fn(&Path, &[u8]) -> io::Result<()>,
    ) -> Result<QueueId, Error> {
        let encoded_args = msaargs::encode(args);

        for id in ids {
            // A stray argument file would otherwise be silently adopted.
            if self.args_path(id).exists() {
                warn!("{}: ID in use by an orphaned argument file", id);
                continue;
            }

            match write(&self.body_path(id), body) {
                Ok(()) => (),
                Err(e) if io::ErrorKind::AlreadyExists == e.kind() => {
                    continue
                },
                Err(e) => return Err(e.into()),
            }

            if let Err(e) = write(&self.args_path(id), &encoded_args) {
                // Don't leave a half-written record behind
                if let Err(e2) = fs::remove_file(self.body_path(id)) {
                    error!(
                        "{}: failed to remove message file after failed \
                         enqueue: {}",
                        id, e2
                    );
                }
                return Err(e.into());
            }

            return Ok(id);
        }

        Err(Error::Io(io::Error::new(
            io::ErrorKind::Other,
            "ran out of candidate message IDs",
        )))
    }

    /// Scan the directory, classifying every message file found.
    pub fn scan(&self) -> Result<Listing, Error> {
        let mut bodies = BTreeSet::new();
        let mut args = BTreeSet::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            let (stem, extension) = match (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) {
                (Some(stem), Some(extension)) => (stem, extension),
                _ => continue,
            };

            let set = match extension {
                BODY_EXTENSION => &mut bodies,
                ARGS_EXTENSION => &mut args,
                _ => continue,
            };

            match stem.parse::<QueueId>() {
                Ok(id) => {
                    set.insert(id);
                },
                Err(_) => warn!(
                    "{}: ignoring unexpected file {}",
                    self.root.display(),
                    path.display()
                ),
            }
        }

        Ok(Listing {
            present: bodies.intersection(&args).copied().collect(),
            body_only: bodies.difference(&args).copied().collect(),
            args_only: args.difference(&bodies).copied().collect(),
        })
    }

    /// Return the IDs of all messages in the queue.
    ///
    /// Half-present messages are reported and excluded.
    pub fn list_ids(&self) -> Result<BTreeSet<QueueId>, Error> {
        let listing = self.scan()?;
        for id in &listing.body_only {
            error!(
                "{}: {} has a message file but no argument file",
                self.root.display(),
                id
            );
        }
        for id in &listing.args_only {
            error!(
                "{}: {} has an argument file but no message file",
                self.root.display(),
                id
            );
        }

        Ok(listing.present)
    }

    /// Whether `id` is a (complete) member of the queue.
    pub fn contains(&self, id: QueueId) -> bool {
        self.body_path(id).is_file() && self.args_path(id).is_file()
    }

    fn require(&self, id: QueueId) -> Result<(), Error> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(Error::NotFound(id))
        }
    }

    pub fn read(&self, id: QueueId) -> Result<MailRecord, Error> {
        self.require(id)?;
        let body =
            fs::read(self.body_path(id)).on_not_found(Error::NotFound(id))?;
        let args = msaargs::decode(
            &fs::read(self.args_path(id)).on_not_found(Error::NotFound(id))?,
        )?;
        Ok(MailRecord { id, body, args })
    }

    /// Remove both files of `id`.
    ///
    /// If the message file is removed but the argument file cannot be, this
    /// fails with `Error::PartialDelete`, leaving an orphan that `list_ids`
    /// will report.
    pub fn delete(&self, id: QueueId) -> Result<(), Error> {
        self.require(id)?;
        fs::remove_file(self.body_path(id))
            .on_not_found(Error::NotFound(id))?;
        fs::remove_file(self.args_path(id))
            .map_err(|source| Error::PartialDelete { id, source })
    }

    pub fn metadata(&self, id: QueueId) -> Result<MessageMetadata, Error> {
        self.require(id)?;
        let path = self.body_path(id);
        let md = fs::metadata(&path).on_not_found(Error::NotFound(id))?;
        let body = fs::read(&path).on_not_found(Error::NotFound(id))?;
        let headers = HeaderSummary::scan(&body);

        Ok(MessageMetadata {
            created_at: DateTime::<Local>::from(md.modified()?),
            size: md.len(),
            to: headers.to,
            subject: headers.subject,
        })
    }
}
