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

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::support::error::Error;

/// The value of `logdir` which selects the system log instead of a file.
pub const SYSLOG: &str = "syslog";

/// The configuration for `msaq`.
///
/// This is a TOML file, by default `~/.config/msaq/config.toml` or
/// `/etc/msaq.toml`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Either the literal string `syslog` or a directory in which
    /// `msaq.log` is kept.
    #[serde(default = "default_logdir")]
    pub logdir: String,

    /// The queue directory.
    ///
    /// If unset, `~/.local/share/msaq` is used.
    #[serde(default)]
    pub datadir: Option<PathBuf>,

    /// The directory holding one queue directory per user, used by
    /// `--deliver-spool`.
    #[serde(default)]
    pub spooldir: Option<PathBuf>,

    /// How long, in seconds, to wait for another process to release a queue
    /// directory before giving up.
    ///
    /// If unset, wait forever.
    #[serde(default)]
    pub lock_timeout: Option<u64>,

    /// Where to connect to decide whether the network is up.
    #[serde(default)]
    pub nwtest: NetworkTestConfig,

    pub msa: MsaConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkTestConfig {
    pub host: String,
    pub port: u16,
    /// Connection timeout in seconds.
    pub timeout: u64,
}

impl Default for NetworkTestConfig {
    fn default() -> Self {
        NetworkTestConfig {
            host: "8.8.8.8".to_owned(),
            port: 53,
            timeout: 5,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MsaConfig {
    /// The MSA command line, split with shell quoting rules. Per-message
    /// arguments are appended to it.
    pub cmd: String,
}

/// Where durable log entries go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogDestination {
    Syslog,
    File(PathBuf),
}

fn default_logdir() -> String {
    SYSLOG.to_owned()
}

impl QueueConfig {
    pub fn parse(text: &[u8]) -> Result<Self, Error> {
        let config: QueueConfig =
            toml::from_slice(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.msa.cmd.trim().is_empty() {
            return Err(Error::Config("msa.cmd must not be empty".to_owned()));
        }

        if 0 == self.nwtest.timeout {
            return Err(Error::Config(
                "nwtest.timeout must be at least 1 second".to_owned(),
            ));
        }

        if self.logdir.is_empty() {
            return Err(Error::Config(
                "logdir must be \"syslog\" or a directory".to_owned(),
            ));
        }

        Ok(())
    }

    pub fn log_destination(&self) -> LogDestination {
        if SYSLOG == self.logdir {
            LogDestination::Syslog
        } else {
            LogDestination::File(Path::new(&self.logdir).join("msaq.log"))
        }
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.nwtest.timeout)
    }

    pub fn lock_wait(&self) -> Option<Duration> {
        self.lock_timeout.map(Duration::from_secs)
    }

    /// Resolve the queue directory, preferring `explicit` (from the command
    /// line) over the configuration, over the default under `$HOME`.
    pub fn data_dir(
        &self,
        explicit: Option<PathBuf>,
    ) -> Result<PathBuf, Error> {
        if let Some(dir) = explicit.or_else(|| self.datadir.clone()) {
            return Ok(dir);
        }

        env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| {
                [Path::new(&home), Path::new(".local/share/msaq")]
                    .iter()
                    .collect()
            })
            .ok_or_else(|| {
                Error::Config(
                    "datadir is not set and $HOME is unavailable".to_owned(),
                )
            })
    }
}

/// The locations searched for the configuration file, in order, when none is
/// given on the command line.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty())
    {
        paths.push(Path::new(&xdg).join("msaq/config.toml"));
    }
    if let Some(home) = env::var_os("HOME").filter(|v| !v.is_empty()) {
        paths.push(Path::new(&home).join(".config/msaq/config.toml"));
    }
    paths.push(PathBuf::from("/etc/msaq.toml"));
    paths
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config =
            QueueConfig::parse(b"[msa]\ncmd = \"/usr/bin/msmtp -t\"\n")
                .unwrap();
        assert_eq!(LogDestination::Syslog, config.log_destination());
        assert_eq!("8.8.8.8", config.nwtest.host);
        assert_eq!(53, config.nwtest.port);
        assert_eq!(Duration::from_secs(5), config.network_timeout());
        assert_eq!(None, config.lock_wait());
        assert_eq!(None, config.spooldir);
        assert_eq!(
            PathBuf::from("/given"),
            config.data_dir(Some(PathBuf::from("/given"))).unwrap()
        );
    }

    #[test]
    fn full_config() {
        let config = QueueConfig::parse(
            br#"
logdir = "/var/log/msaq"
datadir = "/var/lib/msaq"
spooldir = "/var/spool/msaq"
lock_timeout = 30

[nwtest]
host = "smtp.example.com"
port = 587
timeout = 2

[msa]
cmd = "msmtp --account='work mail'"
"#,
        )
        .unwrap();

        assert_eq!(
            LogDestination::File(PathBuf::from("/var/log/msaq/msaq.log")),
            config.log_destination()
        );
        assert_eq!(Some(Duration::from_secs(30)), config.lock_wait());
        assert_eq!("smtp.example.com", config.nwtest.host);
        assert_eq!(587, config.nwtest.port);
        assert_eq!(Duration::from_secs(2), config.network_timeout());
        assert_eq!(
            PathBuf::from("/var/lib/msaq"),
            config.data_dir(None).unwrap()
        );
        assert_eq!(
            PathBuf::from("/override"),
            config.data_dir(Some(PathBuf::from("/override"))).unwrap()
        );
    }

    #[test]
    fn missing_msa_is_config_error() {
        assert_matches!(
            Err(Error::Config(_)),
            QueueConfig::parse(b"logdir = \"syslog\"\n")
        );
        assert_matches!(
            Err(Error::Config(_)),
            QueueConfig::parse(b"[msa]\ncmd = \"  \"\n")
        );
    }

    #[test]
    fn zero_timeout_is_config_error() {
        assert_matches!(
            Err(Error::Config(_)),
            QueueConfig::parse(b"[nwtest]\ntimeout = 0\n[msa]\ncmd = \"x\"\n")
        );
    }
}
