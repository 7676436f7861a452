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
use std::io::{self, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};

use log::info;

use crate::support::error::Error;

/// The external mail submission agent.
///
/// It is run once per delivery attempt with the message on standard input;
/// its exit status is the only thing that decides success.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Msa {
    argv: Vec<String>,
}

/// How an MSA run that did not succeed ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsaFailure {
    ExitStatus(i32),
    Signal(i32),
}

impl fmt::Display for MsaFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MsaFailure::ExitStatus(code) => write!(f, "exit status {}", code),
            MsaFailure::Signal(signal) => {
                write!(f, "killed by signal {}", signal)
            },
        }
    }
}

impl Msa {
    /// Parse the configured command line.
    pub fn parse(cmd: &str) -> Result<Self, Error> {
        let argv = shell_words::split(cmd).map_err(|e| {
            Error::Config(format!("msa.cmd {:?}: {}", cmd, e))
        })?;
        if argv.is_empty() {
            return Err(Error::Config("msa.cmd is empty".to_owned()));
        }

        Ok(Msa { argv })
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// The full argument vector for a message with the given arguments.
    pub fn invocation(&self, args: &[String]) -> Vec<String> {
        self.argv.iter().chain(args).cloned().collect()
    }

    /// Run the MSA, feeding it `body`, and wait for it to finish.
    ///
    /// Failure to start the process at all is an error; anything the process
    /// itself does is reported in the `Ok` value.
    pub fn submit(
        &self,
        body: &[u8],
        args: &[String],
    ) -> Result<Result<(), MsaFailure>, Error> {
        let invocation = self.invocation(args);
        info!("Running {:?}", invocation);

        let mut child = Command::new(&invocation[0])
            .args(&invocation[1..])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| Error::MsaLaunch {
                program: self.program().to_owned(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(body) {
                Ok(()) => (),
                // The MSA quit without reading everything; its exit status
                // will say whether that was a problem.
                Err(e) if io::ErrorKind::BrokenPipe == e.kind() => (),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                },
            }
        }

        Ok(classify(child.wait()?))
    }
}

fn classify(status: ExitStatus) -> Result<(), MsaFailure> {
    if status.success() {
        Ok(())
    } else if let Some(code) = status.code() {
        Err(MsaFailure::ExitStatus(code))
    } else {
        Err(MsaFailure::Signal(status.signal().unwrap_or(0)))
    }
}
