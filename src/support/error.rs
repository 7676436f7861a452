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

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::queue::model::QueueId;
use crate::support::sysexits::*;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No such message in queue: {0}")]
    NotFound(QueueId),
    #[error("Not a valid message ID: {0:?}")]
    BadId(String),
    #[error("Malformed MSA argument file: {0}")]
    MalformedArgs(&'static str),
    #[error("Gave up waiting for the lock on {}", .0.display())]
    LockTimeout(PathBuf),
    #[error("Failed to start MSA '{program}': {source}")]
    MsaLaunch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Message {id} was only partially deleted: {source}")]
    PartialDelete {
        id: QueueId,
        #[source]
        source: io::Error,
    },
    #[error("syslog: {0}")]
    Syslog(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl Error {
    /// The exit code to use if this error terminates the process.
    pub fn sysexit(&self) -> Sysexit {
        match *self {
            Error::Config(..) => EX_CONFIG,
            Error::NotFound(..) | Error::BadId(..) => EX_NOINPUT,
            Error::MalformedArgs(..) => EX_DATAERR,
            Error::LockTimeout(..) => EX_TEMPFAIL,
            Error::MsaLaunch { .. } => EX_UNAVAILABLE,
            Error::Syslog(..) => EX_OSERR,
            Error::PartialDelete { .. } | Error::Io(..) | Error::Nix(..) => {
                EX_IOERR
            },
        }
    }
}
