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

//! The durable record of what happened to each message.
//!
//! This is separate from the diagnostic log (the `log` crate macros, which go
//! to stderr): every entry here is written to the configured destination
//! regardless of verbosity, and only its echo to stderr is subject to the
//! `LogConfig`.

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::prelude::*;
use log::{Level, LevelFilter};
use nix::fcntl::{flock, FlockArg};

use crate::queue::model::QueueId;
use crate::support::error::Error;

/// How chatty the process is on stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub quiet: bool,
    pub verbose: bool,
}

impl LogConfig {
    /// The most verbose level that is shown on stderr.
    pub fn stderr_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }
}

/// Somewhere delivery outcomes are recorded.
pub trait MailLog {
    fn log(
        &self,
        level: Level,
        id: Option<QueueId>,
        message: &str,
    ) -> Result<(), Error>;
}

type SyslogLogger =
    syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>;

enum Backend {
    File(fs::File),
    Syslog(SyslogLogger),
}

/// The `MailLog` used by the program, writing to either a file or syslog.
pub struct QueueLog {
    config: LogConfig,
    backend: Mutex<Backend>,
}

impl QueueLog {
    /// Log to the file at `path`, which is created if needed.
    ///
    /// The file is opened immediately, so it stays usable if the process
    /// later gives up its privileges.
    pub fn file(config: LogConfig, path: &Path) -> Result<Self, Error> {
        let file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o640)
            .open(path)?;
        Ok(QueueLog {
            config,
            backend: Mutex::new(Backend::File(file)),
        })
    }

    /// Log to the local syslog daemon under the mail facility.
    pub fn syslog(config: LogConfig) -> Result<Self, Error> {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_MAIL,
            hostname: None,
            process: env!("CARGO_PKG_NAME").to_owned(),
            pid: nix::unistd::getpid().as_raw() as u32,
        };

        let logger =
            syslog::unix(formatter).map_err(|e| Error::Syslog(e.to_string()))?;
        Ok(QueueLog {
            config,
            backend: Mutex::new(Backend::Syslog(logger)),
        })
    }
}

impl MailLog for QueueLog {
    fn log(
        &self,
        level: Level,
        id: Option<QueueId>,
        message: &str,
    ) -> Result<(), Error> {
        let text = entry_text(id, message);

        {
            let mut backend =
                self.backend.lock().unwrap_or_else(PoisonError::into_inner);
            match *backend {
                Backend::File(ref mut file) => {
                    let line = format!(
                        "{} {}\n",
                        Local::now().format("%Y-%m-%d %H:%M:%S"),
                        text
                    );
                    append_locked(file, line.as_bytes())?;
                },
                Backend::Syslog(ref mut logger) => {
                    let result = match level {
                        Level::Error => logger.err(&text),
                        Level::Warn => logger.warning(&text),
                        _ => logger.info(&text),
                    };
                    result.map_err(|e| Error::Syslog(e.to_string()))?;
                },
            }
        }

        if level <= self.config.stderr_level() {
            eprintln!("{}: {}", env!("CARGO_PKG_NAME"), text);
        }

        Ok(())
    }
}

fn entry_text(id: Option<QueueId>, message: &str) -> String {
    let mut text = String::new();
    if let Some(id) = id {
        let _ = write!(text, "[{}] ", id);
    }
    text.push_str(message);
    text
}

/// Append `data` to `file` while holding an exclusive `flock`, so lines from
/// concurrent processes never interleave.
fn append_locked(file: &mut fs::File, data: &[u8]) -> Result<(), Error> {
    flock(file.as_raw_fd(), FlockArg::LockExclusive)?;
    let result = file.write_all(data).and_then(|()| file.flush());
    flock(file.as_raw_fd(), FlockArg::Unlock)?;
    result?;
    Ok(())
}

#[cfg(test)]
pub mod test_support {
    use std::cell::RefCell;

    use super::*;

    /// A `MailLog` which just remembers its entries.
    #[derive(Default)]
    pub struct MemoryLog {
        pub entries: RefCell<Vec<(Level, Option<QueueId>, String)>>,
    }

    impl MemoryLog {
        pub fn messages(&self) -> Vec<String> {
            self.entries
                .borrow()
                .iter()
                .map(|&(_, _, ref m)| m.clone())
                .collect()
        }
    }

    impl MailLog for MemoryLog {
        fn log(
            &self,
            level: Level,
            id: Option<QueueId>,
            message: &str,
        ) -> Result<(), Error> {
            self.entries
                .borrow_mut()
                .push((level, id, message.to_owned()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stderr_levels() {
        assert_eq!(LevelFilter::Warn, LogConfig::default().stderr_level());
        assert_eq!(
            LevelFilter::Error,
            LogConfig {
                quiet: true,
                verbose: true
            }
            .stderr_level()
        );
        assert_eq!(
            LevelFilter::Info,
            LogConfig {
                quiet: false,
                verbose: true
            }
            .stderr_level()
        );
    }

    #[test]
    fn file_log_appends_lines() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("msaq.log");
        fs::write(&path, b"earlier line\n").unwrap();

        let log = QueueLog::file(
            LogConfig {
                quiet: true,
                verbose: false,
            },
            &path,
        )
        .unwrap();
        log.log(Level::Info, Some(QueueId(0xC0FFEE)), "delivered to x@y")
            .unwrap();
        log.log(Level::Warn, None, "network unreachable").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(3, lines.len());
        assert_eq!("earlier line", lines[0]);
        // YYYY-MM-DD HH:MM:SS is 19 characters
        assert_eq!(" [00C0FFEE] delivered to x@y", &lines[1][19..]);
        assert_eq!(" network unreachable", &lines[2][19..]);
        assert!(NaiveDateTime::parse_from_str(
            &lines[1][..19],
            "%Y-%m-%d %H:%M:%S"
        )
        .is_ok());
    }

    #[test]
    fn file_log_unwritable_location() {
        let root = tempfile::TempDir::new().unwrap();
        assert_matches!(
            Err(Error::Io(_)),
            QueueLog::file(
                LogConfig::default(),
                &root.path().join("nx/msaq.log")
            )
            .map(|_| ())
        );
    }
}
