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

use std::fmt;
use std::str::FromStr;

use chrono::prelude::*;
use rand::{rngs::OsRng, Rng};

use crate::support::error::Error;

/// Identifies a message in a queue directory.
///
/// IDs are 32 random bits, rendered as 8 upper-case hex digits. They are
/// only unique within one directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId(pub u32);

impl QueueId {
    pub fn random() -> Self {
        QueueId(OsRng.gen())
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl FromStr for QueueId {
    type Err = Error;

    /// Parses exactly 8 hex digits. Lower case is accepted since people type
    /// these in by hand.
    fn from_str(s: &str) -> Result<Self, Error> {
        if 8 != s.len() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::BadId(s.to_owned()));
        }

        u32::from_str_radix(s, 16)
            .map(QueueId)
            .map_err(|_| Error::BadId(s.to_owned()))
    }
}

/// A fully-loaded queued message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailRecord {
    pub id: QueueId,
    /// The raw RFC 5322 message.
    pub body: Vec<u8>,
    /// Arguments appended to the MSA command line for this message.
    pub args: Vec<String>,
}

/// What `--list` shows about a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageMetadata {
    pub created_at: DateTime<Local>,
    pub size: u64,
    pub to: Option<String>,
    pub subject: Option<String>,
}

/// The display headers extracted from a message body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderSummary {
    pub to: Option<String>,
    pub subject: Option<String>,
}

impl HeaderSummary {
    /// Scan `body` for the first `Subject:` line and the recipient line.
    ///
    /// The recipient is the first `To:` line; once it is found, later `Cc:`
    /// lines are no longer considered. Without any `To:`, the last `Cc:` line
    /// is used. Invalid UTF-8 is replaced rather than rejected.
    pub fn scan(body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let mut to = None::<String>;
        let mut cc = None::<String>;
        let mut subject = None::<String>;

        for line in text.lines() {
            if subject.is_none() {
                if let Some(value) = header_value(line, "Subject:") {
                    subject = Some(value);
                }
            }

            if to.is_none() {
                if let Some(value) = header_value(line, "To:") {
                    to = Some(value);
                } else if let Some(value) = header_value(line, "Cc:") {
                    cc = Some(value);
                }
            }

            if to.is_some() && subject.is_some() {
                break;
            }
        }

        HeaderSummary {
            to: to.or(cc),
            subject,
        }
    }
}

fn header_value(line: &str, name: &str) -> Option<String> {
    let prefix = line.get(..name.len())?;
    if prefix.eq_ignore_ascii_case(name) {
        Some(line[name.len()..].trim().to_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_formatting() {
        assert_eq!("00000000", QueueId(0).to_string());
        assert_eq!("0000ABCD", QueueId(0xABCD).to_string());
        assert_eq!("FFFFFFFF", QueueId(u32::MAX).to_string());
    }

    #[test]
    fn id_parsing() {
        assert_eq!(QueueId(0xDEADBEEF), "DEADBEEF".parse().unwrap());
        assert_eq!(QueueId(0xDEADBEEF), "deadbeef".parse().unwrap());
        assert_eq!(QueueId(1), "00000001".parse().unwrap());
        assert_matches!(Err(Error::BadId(_)), "1".parse::<QueueId>());
        assert_matches!(Err(Error::BadId(_)), "+0000001".parse::<QueueId>());
        assert_matches!(Err(Error::BadId(_)), "DEADBEEF0".parse::<QueueId>());
        assert_matches!(Err(Error::BadId(_)), "DEADBEEG".parse::<QueueId>());
        assert_matches!(Err(Error::BadId(_)), "ÄDEADBE".parse::<QueueId>());
    }

    #[test]
    fn header_scan_basic() {
        let summary = HeaderSummary::scan(
            b"From: me@example.com\r\n\
              To: you@example.com\r\n\
              Subject: Hello there\r\n\
              \r\n\
              Body\r\n",
        );
        assert_eq!(Some("you@example.com"), summary.to.as_deref());
        assert_eq!(Some("Hello there"), summary.subject.as_deref());
    }

    #[test]
    fn header_scan_to_beats_cc() {
        let summary = HeaderSummary::scan(
            b"Cc: first@example.com\n\
              To: main@example.com\n\
              Cc: later@example.com\n",
        );
        assert_eq!(Some("main@example.com"), summary.to.as_deref());
        assert_eq!(None, summary.subject);
    }

    #[test]
    fn header_scan_falls_back_to_last_cc() {
        let summary = HeaderSummary::scan(
            b"Cc: first@example.com\n\
              subject: lower case\n\
              CC: second@example.com\n",
        );
        assert_eq!(Some("second@example.com"), summary.to.as_deref());
        assert_eq!(Some("lower case"), summary.subject.as_deref());
    }

    #[test]
    fn header_scan_subject_after_to() {
        let summary =
            HeaderSummary::scan(b"To: a@example.com\nSubject: later\n");
        assert_eq!(Some("a@example.com"), summary.to.as_deref());
        assert_eq!(Some("later"), summary.subject.as_deref());
    }

    #[test]
    fn header_scan_tolerates_bad_utf8() {
        let summary = HeaderSummary::scan(b"Subject: caf\xE9\nTo: x@y\n");
        assert_eq!(Some("caf\u{FFFD}"), summary.subject.as_deref());
        assert_eq!(Some("x@y"), summary.to.as_deref());

        assert_eq!(HeaderSummary::default(), HeaderSummary::scan(b"\xFF\xFE"));
    }
}
