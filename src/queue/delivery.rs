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

//! Delivery of queued messages through the MSA.
//!
//! Each attempt goes: check the network; if it is down, leave the message
//! alone. Otherwise run the MSA on the message. Exit status 0 means it was
//! accepted, so the success is logged and the message deleted. Anything else
//! is logged as a failure and the message is kept for the next run.

use log::{error, info, Level};

use super::model::QueueId;
use super::msa::{Msa, MsaFailure};
use super::probe::Reachability;
use super::store::Queue;
use crate::support::error::Error;
use crate::support::mail_log::MailLog;

/// The outcome of one `deliver_one` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    /// The MSA accepted the message and it has been removed from the queue.
    Delivered,
    /// The MSA failed; the message is still queued.
    Retained(MsaFailure),
    /// The network is down, so nothing was tried.
    Skipped,
}

/// Tallies of a `deliver_all` run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub delivered: usize,
    pub retained: usize,
    /// Messages that could not be attempted due to an error (reported as it
    /// happened).
    pub errors: usize,
    /// Whether the whole run was skipped because the network is down.
    pub offline: bool,
}

pub struct DeliveryEngine<'a> {
    pub queue: &'a Queue,
    pub network: &'a dyn Reachability,
    pub msa: &'a Msa,
    pub log: &'a dyn MailLog,
}

impl DeliveryEngine<'_> {
    /// Try to deliver the message `id`.
    ///
    /// MSA failures are logged and reflected in the result. Errors are
    /// returned only if the attempt could not be made at all: the message
    /// does not exist, the queue could not be read or updated, or the MSA
    /// could not be started. The exception is a mail log failure after the
    /// MSA accepted the message, which is returned once the message has
    /// been removed from the queue.
    pub fn deliver_one(&self, id: QueueId) -> Result<Attempt, Error> {
        if !self.queue.contains(id) {
            return Err(Error::NotFound(id));
        }

        if !self.network.is_reachable() {
            info!("{}: network is unreachable, not trying", id);
            return Ok(Attempt::Skipped);
        }

        let record = self.queue.read(id)?;
        let recipients = describe_recipients(&record.args);
        match self.msa.submit(&record.body, &record.args)? {
            Ok(()) => {
                // The MSA owns the message now, so it leaves the queue even
                // if the log entry cannot be written.
                let logged = self.log.log(
                    Level::Info,
                    Some(id),
                    &format!("delivered to {}", recipients),
                );
                if let Err(e) = self.queue.delete(id) {
                    if let Err(log_error) = logged {
                        error!("{}: failed to log delivery: {}", id, log_error);
                    }
                    return Err(e);
                }
                logged?;
                Ok(Attempt::Delivered)
            },

            Err(failure) => {
                self.log.log(
                    Level::Warn,
                    Some(id),
                    &format!(
                        "delivery to {} failed: MSA {}; message kept in queue",
                        recipients, failure
                    ),
                )?;
                Ok(Attempt::Retained(failure))
            },
        }
    }

    /// Try to deliver everything in the queue.
    ///
    /// A problem with one message is logged and does not stop the others.
    /// Failing to list the queue or to start the MSA at all ends the batch
    /// with an error, since every remaining message would fail the same way.
    pub fn deliver_all(&self) -> Result<BatchReport, Error> {
        let mut report = BatchReport::default();

        if !self.network.is_reachable() {
            self.log.log(
                Level::Info,
                None,
                &format!(
                    "network is unreachable, not flushing {}",
                    self.queue.root().display()
                ),
            )?;
            report.offline = true;
            return Ok(report);
        }

        for id in self.queue.list_ids()? {
            match self.deliver_one(id) {
                Ok(Attempt::Delivered) => report.delivered += 1,
                Ok(Attempt::Retained(_)) => report.retained += 1,
                Ok(Attempt::Skipped) => {
                    report.offline = true;
                    break;
                },
                Err(e) => {
                    error!("{}: {}", id, e);
                    report.errors += 1;
                    if let Err(e2) = self.log.log(
                        Level::Error,
                        Some(id),
                        &format!("delivery error: {}", e),
                    ) {
                        error!("{}: failed to log error: {}", id, e2);
                    }

                    if let Error::MsaLaunch { .. } = e {
                        return Err(e);
                    }
                },
            }
        }

        Ok(report)
    }

    /// Queue a message, then try to flush the whole queue.
    pub fn send(
        &self,
        body: &[u8],
        args: &[String],
    ) -> Result<(QueueId, BatchReport), Error> {
        let id = self.queue.enqueue(body, args)?;
        info!(
            "{}: queued {} bytes for {}",
            id,
            body.len(),
            describe_recipients(args)
        );
        let report = self.deliver_all()?;
        Ok((id, report))
    }
}

fn describe_recipients(args: &[String]) -> String {
    if args.is_empty() {
        "(no MSA arguments)".to_owned()
    } else {
        args.join(" ")
    }
}
