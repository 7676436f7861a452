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

//! The individual commands, each returning the process exit status.

use std::io::{Read, Write};
use std::path::Path;

use log::{error, info, warn, Level};

use crate::queue::delivery::{Attempt, BatchReport, DeliveryEngine};
use crate::queue::inspect::list_queue;
use crate::queue::model::QueueId;
use crate::queue::spool::SpoolDelivery;
use crate::queue::store::Queue;
use crate::support::error::Error;
use crate::support::sysexits::*;

pub fn send(
    engine: &DeliveryEngine<'_>,
    mut input: impl Read,
    args: &[String],
) -> Sysexit {
    let mut body = Vec::new();
    if let Err(e) = input.read_to_end(&mut body) {
        error!("Failed to read message from standard input: {}", e);
        return EX_IOERR;
    }

    match engine.send(&body, args) {
        Ok((id, report)) => {
            info!("Queued as {}", id);
            batch_status(&report)
        },
        Err(e) => {
            error!("Send failed: {}", e);
            e.sysexit()
        },
    }
}

pub fn list(queue: &Queue, out: &mut impl Write) -> Sysexit {
    match list_queue(queue, out) {
        Ok(_) => EX_OK,
        Err(e) => {
            error!("Failed to list queue: {}", e);
            e.sysexit()
        },
    }
}

pub fn deliver_all(engine: &DeliveryEngine<'_>) -> Sysexit {
    match engine.deliver_all() {
        Ok(report) => batch_status(&report),
        Err(e) => {
            error!("Failed to flush queue: {}", e);
            e.sysexit()
        },
    }
}

pub fn deliver(engine: &DeliveryEngine<'_>, ids: &[String]) -> Sysexit {
    for_each_id(ids, |id| match engine.deliver_one(id)? {
        Attempt::Delivered => {
            info!("{}: delivered", id);
            Ok(EX_OK)
        },
        Attempt::Retained(failure) => {
            warn!("{}: MSA {}, message kept in queue", id, failure);
            Ok(EX_OK)
        },
        Attempt::Skipped => {
            warn!("{}: network is unreachable, message kept in queue", id);
            Ok(EX_OK)
        },
    })
}

pub fn delete(engine: &DeliveryEngine<'_>, ids: &[String]) -> Sysexit {
    for_each_id(ids, |id| {
        engine.queue.delete(id)?;
        engine.log.log(Level::Info, Some(id), "deleted from queue")?;
        Ok(EX_OK)
    })
}

pub fn deliver_spool(spool: &SpoolDelivery<'_>, spool_dir: &Path) -> Sysexit {
    match spool.deliver_spool(spool_dir) {
        Ok(report) if report.failed > 0 => {
            warn!(
                "{} mailbox(es) flushed, {} failed",
                report.succeeded, report.failed
            );
            EX_TEMPFAIL
        },
        Ok(report) => {
            info!("{} mailbox(es) flushed", report.succeeded);
            EX_OK
        },
        Err(e) => {
            error!("Failed to flush spool '{}': {}", spool_dir.display(), e);
            e.sysexit()
        },
    }
}

/// Runs `f` on every ID in `ids`.
///
/// IDs which are malformed, unknown, or whose record cannot be decoded are
/// reported and skipped, which makes the final status `EX_NOINPUT`. Any
/// other error stops processing immediately.
fn for_each_id(
    ids: &[String],
    mut f: impl FnMut(QueueId) -> Result<Sysexit, Error>,
) -> Sysexit {
    let mut status = EX_OK;
    for raw in ids {
        let result = raw
            .parse::<QueueId>()
            .map_err(|_| Error::BadId(raw.clone()))
            .and_then(&mut f);
        match result {
            Ok(s) => status = status.or(s),
            Err(
                e @ Error::BadId(..)
                | e @ Error::NotFound(..)
                | e @ Error::MalformedArgs(..),
            ) => {
                error!("{}: {}", raw, e);
                status = status.or(EX_NOINPUT);
            },
            Err(e) => {
                error!("{}: {}", raw, e);
                return status.or(e.sysexit());
            },
        }
    }

    status
}

fn batch_status(report: &BatchReport) -> Sysexit {
    if report.errors > 0 {
        warn!(
            "{} message(s) could not be attempted; see the mail log",
            report.errors
        );
        EX_TEMPFAIL
    } else {
        EX_OK
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::queue::msa::Msa;
    use crate::queue::probe::Reachability;
    use crate::queue::store::ARGS_EXTENSION;
    use crate::support::mail_log::test_support::MemoryLog;

    struct Up;
    impl Reachability for Up {
        fn is_reachable(&self) -> bool {
            true
        }
    }

    struct Setup {
        _root: TempDir,
        queue: Queue,
        msa: Msa,
        log: MemoryLog,
    }

    impl Setup {
        fn new(msa: &str) -> Self {
            crate::init_test_log();
            let root = TempDir::new().unwrap();
            let queue = Queue::open(root.path().to_owned(), None).unwrap();
            Setup {
                _root: root,
                queue,
                msa: Msa::parse(msa).unwrap(),
                log: MemoryLog::default(),
            }
        }

        fn engine(&self) -> DeliveryEngine<'_> {
            DeliveryEngine {
                queue: &self.queue,
                network: &Up,
                msa: &self.msa,
                log: &self.log,
            }
        }
    }

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().copied().map(str::to_owned).collect()
    }

    #[test]
    fn send_reads_body_from_input() {
        let setup = Setup::new("/bin/false");
        assert_eq!(
            EX_OK,
            send(
                &setup.engine(),
                &b"Subject: hello\n\nbody\n"[..],
                &strings(&["a@example.com"])
            )
        );

        let ids = setup.queue.list_ids().unwrap();
        assert_eq!(1, ids.len());
        let record = setup.queue.read(*ids.iter().next().unwrap()).unwrap();
        assert_eq!(b"Subject: hello\n\nbody\n" as &[u8], &record.body[..]);
        assert_eq!(strings(&["a@example.com"]), record.args);
    }

    #[test]
    fn delete_skips_bad_ids() {
        let setup = Setup::new("/bin/false");
        let a = setup.queue.enqueue(b"a", &[]).unwrap();
        let b = setup.queue.enqueue(b"b", &[]).unwrap();

        let status = delete(
            &setup.engine(),
            &[
                "nonsense".to_owned(),
                a.to_string(),
                a.to_string(),
            ],
        );
        assert_eq!(EX_NOINPUT, status);
        assert!(!setup.queue.contains(a));
        assert!(setup.queue.contains(b));
        assert_eq!(vec!["deleted from queue".to_owned()], setup.log.messages());
        assert_eq!(Some(a), setup.log.entries.borrow()[0].1);

        assert_eq!(EX_OK, delete(&setup.engine(), &[b.to_string()]));
        assert!(setup.queue.list_ids().unwrap().is_empty());
    }

    #[test]
    fn deliver_reports_outcomes() {
        let setup = Setup::new("/bin/true");
        let a = setup.queue.enqueue(b"a", &[]).unwrap();
        let b = setup.queue.enqueue(b"b", &[]).unwrap();

        assert_eq!(EX_OK, deliver(&setup.engine(), &[a.to_string()]));
        assert!(!setup.queue.contains(a));
        assert!(setup.queue.contains(b));

        assert_eq!(
            EX_NOINPUT,
            deliver(&setup.engine(), &[a.to_string(), b.to_string()])
        );
        assert!(setup.queue.list_ids().unwrap().is_empty());
    }

    #[test]
    fn deliver_all_reports_per_record_errors() {
        let setup = Setup::new("/bin/true");
        let good = setup.queue.enqueue(b"good", &[]).unwrap();
        let bad = setup.queue.enqueue(b"bad", &[]).unwrap();
        fs::write(
            setup
                .queue
                .root()
                .join(format!("{}.{}", bad, ARGS_EXTENSION)),
            b"garbage",
        )
        .unwrap();

        assert_eq!(EX_TEMPFAIL, deliver_all(&setup.engine()));
        assert!(!setup.queue.contains(good));
        assert!(setup.queue.contains(bad));
        assert_eq!(EX_NOINPUT, deliver(&setup.engine(), &[bad.to_string()]));
    }

    #[test]
    fn unlaunchable_msa_stops_batch() {
        let setup = Setup::new("/nonexistent/msa");
        let a = setup.queue.enqueue(b"a", &[]).unwrap();
        let b = setup.queue.enqueue(b"b", &[]).unwrap();

        assert_eq!(EX_UNAVAILABLE, deliver_all(&setup.engine()));
        assert!(setup.queue.contains(a));
        assert!(setup.queue.contains(b));
        assert_eq!(1, setup.log.messages().len());
    }

    #[test]
    fn list_writes_to_output() {
        let setup = Setup::new("/bin/true");
        let mut out = Vec::new();
        assert_eq!(EX_OK, list(&setup.queue, &mut out));
        assert_eq!("Queue is empty.\n", String::from_utf8(out).unwrap());
    }
}
