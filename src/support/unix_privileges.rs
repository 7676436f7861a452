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

use std::ffi::CString;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use log::{error, warn};

use super::sysexits::*;

/// Permanently drop privileges to those of the owner of `dir`.
///
/// This is used by spool delivery, which runs as root but must handle each
/// user's queue (and run the MSA) as that user. It must only be called in a
/// process dedicated to that one user, since there is no way back.
///
/// If the current process is not running as root, does nothing.
///
/// On failure, an error message has already been logged, and the appropriate
/// exit code is returned.
pub fn assume_owner(log_prefix: &str, dir: &Path) -> Result<(), Sysexit> {
    macro_rules! fatal {
        ($sysexit:expr, $($stuff:tt)*) => {{
            error!($($stuff)*);
            return Err($sysexit)
        }}
    }

    if !nix::unistd::getuid().is_root() {
        return Ok(());
    }

    let md = match dir.metadata() {
        Ok(md) => md,
        Err(e) => fatal!(
            EX_NOINPUT,
            "{} Failed to stat '{}': {}",
            log_prefix,
            dir.display(),
            e
        ),
    };

    let target_uid = nix::unistd::Uid::from_raw(md.uid());
    if target_uid.is_root() {
        fatal!(
            EX_NOPERM,
            "{} '{}' is owned by root; refusing to deliver its mail as root",
            log_prefix,
            dir.display()
        );
    }

    let (has_user_groups, target_gid) =
        match nix::unistd::User::from_uid(target_uid) {
            Ok(Some(user)) => {
                let name = match CString::new(user.name.clone()) {
                    Ok(name) => name,
                    Err(_) => fatal!(
                        EX_OSERR,
                        "{} Got UNIX user name with NUL",
                        log_prefix
                    ),
                };
                match nix::unistd::initgroups(&name, user.gid) {
                    Ok(()) => (true, user.gid),
                    Err(e) => {
                        warn!(
                            "{} Failed to init groups for user: {}",
                            log_prefix, e
                        );
                        (false, user.gid)
                    },
                }
            },
            Ok(None) => {
                warn!(
                    "{} No passwd entry for UID {}, assuming GID {}",
                    log_prefix,
                    target_uid,
                    md.gid()
                );
                (false, nix::unistd::Gid::from_raw(md.gid()))
            },
            Err(e) => {
                warn!(
                    "{} Failed to look up passwd entry for UID {}, \
                     assuming GID {}: {}",
                    log_prefix,
                    target_uid,
                    md.gid(),
                    e
                );
                (false, nix::unistd::Gid::from_raw(md.gid()))
            },
        };

    if let Err(e) = if has_user_groups {
        Ok(())
    } else {
        nix::unistd::setgroups(&[target_gid])
    }
    .and_then(|()| nix::unistd::setgid(target_gid))
    .and_then(|()| nix::unistd::setuid(target_uid))
    {
        fatal!(
            EX_OSERR,
            "{} Failed to drop privileges to {}:{}: {}",
            log_prefix,
            target_uid,
            target_gid,
            e
        );
    }

    if nix::unistd::geteuid().is_root() {
        fatal!(
            EX_SOFTWARE,
            "{} Still root after dropping privileges",
            log_prefix
        );
    }

    Ok(())
}
