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

use std::fs;
use std::io;
use std::mem;
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;

use structopt::StructOpt;

use super::commands;
use crate::queue::delivery::DeliveryEngine;
use crate::queue::msa::Msa;
use crate::queue::probe::NetworkProbe;
use crate::queue::spool::SpoolDelivery;
use crate::queue::store::Queue;
use crate::support::config::{self, LogDestination, QueueConfig};
use crate::support::error::Error;
use crate::support::mail_log::{LogConfig, QueueLog};
use crate::support::sysexits::*;

/// Durable mail queue in front of an SMTP submission client.
///
/// Mail passed to --send is saved in the queue directory and handed to the
/// configured MSA (mail submission agent, e.g. msmtp) whenever the network is
/// up. Mail the MSA cannot deliver stays queued until a later --send,
/// --deliver-all (typically from cron) or --deliver succeeds.
///
/// With no command, the queue is listed.
#[derive(StructOpt, Debug)]
#[structopt(max_term_width = 80)]
pub(super) struct Options {
    /// Queue the message on standard input, then try to deliver everything
    /// in the queue. Trailing arguments are passed on to the MSA.
    #[structopt(long)]
    send: bool,

    /// List the messages in the queue.
    #[structopt(long)]
    list: bool,

    /// Try to deliver every message in the queue.
    #[structopt(long)]
    deliver_all: bool,

    /// Try to deliver the given messages.
    #[structopt(long, value_name = "ID")]
    deliver: Vec<String>,

    /// Remove the given messages from the queue without delivering them.
    #[structopt(long, value_name = "ID")]
    delete: Vec<String>,

    /// Try to deliver everything in every user's queue under the configured
    /// spool directory. Must be run as root.
    #[structopt(long)]
    deliver_spool: bool,

    /// The configuration file
    /// [default: ~/.config/msaq/config.toml or /etc/msaq.toml]
    #[structopt(short = "C", long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Only report errors.
    #[structopt(short, long)]
    quiet: bool,

    /// Report progress.
    #[structopt(short, long)]
    verbose: bool,

    /// The queue directory, overriding `datadir` from the configuration.
    #[structopt(long, parse(from_os_str))]
    data_dir: Option<PathBuf>,

    /// Arguments for the MSA (--send only), typically the recipients. Use
    /// `--` before them if the first starts with `-`.
    #[structopt(name = "MSA-ARGS")]
    msa_args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Action {
    Send(Vec<String>),
    List,
    DeliverAll,
    Deliver(Vec<String>),
    Delete(Vec<String>),
    DeliverSpool,
}

impl Options {
    fn action(&mut self) -> Result<Action, &'static str> {
        let mut actions = Vec::new();
        if self.send {
            actions.push(Action::Send(mem::take(&mut self.msa_args)));
        }
        if self.list {
            actions.push(Action::List);
        }
        if self.deliver_all {
            actions.push(Action::DeliverAll);
        }
        if !self.deliver.is_empty() {
            actions.push(Action::Deliver(mem::take(&mut self.deliver)));
        }
        if !self.delete.is_empty() {
            actions.push(Action::Delete(mem::take(&mut self.delete)));
        }
        if self.deliver_spool {
            actions.push(Action::DeliverSpool);
        }

        if actions.len() > 1 {
            return Err("Only one command may be given at a time");
        }
        if !self.msa_args.is_empty() {
            return Err("MSA arguments are only accepted with --send");
        }
        if self.deliver_spool && self.data_dir.is_some() {
            return Err("--data-dir cannot be used with --deliver-spool");
        }

        Ok(actions.pop().unwrap_or(Action::List))
    }

    fn log_config(&self) -> LogConfig {
        LogConfig {
            quiet: self.quiet,
            verbose: self.verbose,
        }
    }
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let mut options = Options::from_clap(&match Options::clap()
        .get_matches_safe()
    {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    let log_config = options.log_config();
    crate::init_simple_log(log_config.stderr_level());

    let action = match options.action() {
        Ok(action) => action,
        Err(message) => {
            eprintln!("{}", message);
            EX_USAGE.exit()
        },
    };

    let config = load_config(options.config.take());
    let msa = match Msa::parse(&config.msa.cmd) {
        Ok(msa) => msa,
        Err(e) => die!(EX_CONFIG, "{}", e),
    };

    let log = match config.log_destination() {
        LogDestination::Syslog => QueueLog::syslog(log_config),
        LogDestination::File(ref path) => QueueLog::file(log_config, path),
    };
    let log = match log {
        Ok(log) => log,
        Err(e) => die!(EX_CANTCREAT, "Failed to open the mail log: {}", e),
    };

    let network = NetworkProbe::new(
        config.nwtest.host.clone(),
        config.nwtest.port,
        config.network_timeout(),
    );

    if Action::DeliverSpool == action {
        if !nix::unistd::geteuid().is_root() {
            die!(EX_NOPERM, "--deliver-spool must be run as root");
        }

        let spool_dir = match config.spooldir {
            Some(ref dir) => dir,
            None => die!(EX_CONFIG, "--deliver-spool requires `spooldir`"),
        };

        let spool = SpoolDelivery {
            network: &network,
            msa: &msa,
            log: &log,
            lock_wait: config.lock_wait(),
            as_owner: true,
        };
        commands::deliver_spool(&spool, spool_dir).exit();
    }

    let data_dir = match config.data_dir(options.data_dir.take()) {
        Ok(dir) => dir,
        Err(e) => die!(EX_CONFIG, "{}", e),
    };
    if let Err(e) = fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&data_dir)
    {
        die!(EX_CANTCREAT, "Failed to create '{}': {}", data_dir.display(), e);
    }

    let queue = match Queue::open(data_dir, config.lock_wait()) {
        Ok(queue) => queue,
        Err(e) => die!(e.sysexit(), "{}", e),
    };
    let engine = DeliveryEngine {
        queue: &queue,
        network: &network,
        msa: &msa,
        log: &log,
    };

    let status = match action {
        Action::Send(args) => {
            commands::send(&engine, io::stdin().lock(), &args)
        },
        Action::List => commands::list(&queue, &mut io::stdout().lock()),
        Action::DeliverAll => commands::deliver_all(&engine),
        Action::Deliver(ids) => commands::deliver(&engine, &ids),
        Action::Delete(ids) => commands::delete(&engine, &ids),
        Action::DeliverSpool => unreachable!(),
    };

    // Release the queue before exiting, since exit() skips destructors.
    drop(queue);
    status.exit()
}

fn load_config(explicit: Option<PathBuf>) -> QueueConfig {
    let path = match explicit {
        Some(path) => path,
        None => match config::default_config_paths()
            .into_iter()
            .find(|p| p.is_file())
        {
            Some(path) => path,
            None => die!(
                EX_CONFIG,
                "No configuration file found; looked for {}",
                config::default_config_paths()
                    .iter()
                    .map(|p| format!("'{}'", p.display()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
    };

    let text = match fs::read(&path) {
        Ok(text) => text,
        Err(e) => die!(EX_CONFIG, "Error reading '{}': {}", path.display(), e),
    };

    match QueueConfig::parse(&text) {
        Ok(config) => config,
        Err(Error::Config(e)) => die!(
            EX_CONFIG,
            "Error in config file at '{}': {}",
            path.display(),
            e
        ),
        Err(e) => die!(e.sysexit(), "{}", e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn action_of(args: &[&str]) -> Result<Action, &'static str> {
        Options::from_iter_safe(
            std::iter::once("msaq").chain(args.iter().copied()),
        )
        .expect("command line rejected by clap")
        .action()
    }

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().copied().map(str::to_owned).collect()
    }

    #[test]
    fn default_is_list() {
        assert_eq!(Ok(Action::List), action_of(&[]));
        assert_eq!(Ok(Action::List), action_of(&["--list", "-v"]));
        assert_eq!(Ok(Action::List), action_of(&["-q", "-C", "/x.toml"]));
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            Ok(Action::Send(strings(&["a@example.com", "b@example.com"]))),
            action_of(&["--send", "a@example.com", "b@example.com"])
        );
        assert_eq!(
            Ok(Action::Send(strings(&["-f", "me@example.com", "you@x"]))),
            action_of(&["--send", "--", "-f", "me@example.com", "you@x"])
        );
        assert_eq!(Ok(Action::Send(vec![])), action_of(&["--send"]));
        assert_eq!(
            Ok(Action::Deliver(strings(&["0000000A", "0000000B"]))),
            action_of(&["--deliver", "0000000A", "0000000B"])
        );
        assert_eq!(
            Ok(Action::Delete(strings(&["0000000A"]))),
            action_of(&["--data-dir", "/tmp/q", "--delete", "0000000A"])
        );
        assert_eq!(Ok(Action::DeliverAll), action_of(&["--deliver-all"]));
        assert_eq!(Ok(Action::DeliverSpool), action_of(&["--deliver-spool"]));
    }

    #[test]
    fn conflicting_commands() {
        assert!(action_of(&["--send", "--list"]).is_err());
        assert!(
            action_of(&["--deliver-all", "--deliver", "0000000A"]).is_err()
        );
        assert!(action_of(&["--list", "a@example.com"]).is_err());
        assert!(action_of(&["a@example.com"]).is_err());
        assert!(
            action_of(&["--deliver-spool", "--data-dir", "/tmp/q"]).is_err()
        );
    }

    #[test]
    fn flags() {
        let options =
            Options::from_iter_safe(&["msaq", "-q", "--verbose"]).unwrap();
        assert_eq!(
            LogConfig {
                quiet: true,
                verbose: true
            },
            options.log_config()
        );
        assert!(Options::from_iter_safe(&["msaq", "--bogus"]).is_err());
    }
}
