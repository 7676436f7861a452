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

use std::cell::Cell;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, error, warn};

/// Decides whether a delivery attempt is worth making right now.
pub trait Reachability {
    fn is_reachable(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReachabilityState {
    Unknown,
    Reachable,
    Unreachable,
}

/// Checks for network access by opening a TCP connection to a well-known
/// host.
///
/// The answer from the first check is kept for the life of the value; the
/// CLI creates exactly one per process.
#[derive(Debug)]
pub struct NetworkProbe {
    host: String,
    port: u16,
    timeout: Duration,
    state: Cell<ReachabilityState>,
}

impl NetworkProbe {
    pub fn new(host: String, port: u16, timeout: Duration) -> Self {
        NetworkProbe {
            host,
            port,
            timeout,
            state: Cell::new(ReachabilityState::Unknown),
        }
    }

    fn probe(&self) -> bool {
        let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect::<Vec<SocketAddr>>(),
            Err(e) => {
                warn!("Failed to resolve {}: {}", self.host, e);
                return false;
            },
        };

        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => {
                    debug!("Network test connection to {} succeeded", addr);
                    return true;
                },
                Err(e) if is_connect_failure(&e) => {
                    debug!("Network test connection to {}: {}", addr, e);
                },
                Err(e) => {
                    error!("Network test connection to {}: {}", addr, e);
                    return false;
                },
            }
        }

        false
    }
}

impl Reachability for NetworkProbe {
    fn is_reachable(&self) -> bool {
        match self.state.get() {
            ReachabilityState::Reachable => true,
            ReachabilityState::Unreachable => false,
            ReachabilityState::Unknown => {
                let reachable = self.probe();
                self.state.set(if reachable {
                    ReachabilityState::Reachable
                } else {
                    ReachabilityState::Unreachable
                });
                reachable
            },
        }
    }
}

/// Whether `e` is one of the ordinary ways a connection fails when the
/// network is down, as opposed to something worth reporting.
fn is_connect_failure(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::TimedOut
        | io::ErrorKind::AddrNotAvailable => true,
        _ => matches!(
            e.raw_os_error(),
            Some(nix::libc::ENETUNREACH)
                | Some(nix::libc::EHOSTUNREACH)
                | Some(nix::libc::ENETDOWN)
                | Some(nix::libc::EHOSTDOWN)
        ),
    }
}

#[cfg(test)]
mod test {
    use std::net::TcpListener;

    use super::*;

    fn probe_for(port: u16) -> NetworkProbe {
        NetworkProbe::new("127.0.0.1".to_owned(), port, Duration::from_secs(2))
    }

    #[test]
    fn listening_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let probe = probe_for(listener.local_addr().unwrap().port());
        assert!(probe.is_reachable());
    }

    #[test]
    fn refused_port_is_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(!probe_for(port).is_reachable());
    }

    #[test]
    fn first_answer_is_kept() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let up = probe_for(port);
        assert!(up.is_reachable());

        let down = probe_for(port);
        drop(listener);
        assert!(!down.is_reachable());

        let listener = TcpListener::bind(("127.0.0.1", port));
        assert!(up.is_reachable());
        assert!(!down.is_reachable());
        drop(listener);
    }

    #[test]
    fn unresolvable_host_is_unreachable() {
        let probe = NetworkProbe::new(
            "no-such-host.invalid".to_owned(),
            53,
            Duration::from_secs(1),
        );
        assert!(!probe.is_reachable());
    }

    #[test]
    fn connect_failure_classification() {
        assert!(is_connect_failure(&io::Error::from(
            io::ErrorKind::ConnectionRefused
        )));
        assert!(is_connect_failure(&io::Error::from_raw_os_error(
            nix::libc::ENETUNREACH
        )));
        assert!(!is_connect_failure(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
    }
}
