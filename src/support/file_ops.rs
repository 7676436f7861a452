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

//! Miscellaneous functions for working with files.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::support::error::Error;

/// Write `data` into the file at `path`, atomically.
///
/// The file is staged as a temporary file in `tmp`, which must be on the same
/// file system as `path`, and synced before it is renamed into place.
///
/// Fails with `AlreadyExists` if `path` already exists, in which case nothing
/// is left behind.
pub fn spit(
    tmp: impl AsRef<Path>,
    path: impl AsRef<Path>,
    mode: u32,
    data: &[u8],
) -> io::Result<()> {
    let mut tf = tempfile::NamedTempFile::new_in(tmp)?;
    tf.as_file_mut().write_all(data)?;
    chmod(tf.path(), mode)?;
    tf.as_file_mut().sync_all()?;
    tf.persist_noclobber(path)?;
    Ok(())
}

pub fn chmod(path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

pub trait IgnoreKinds {
    fn ignore_not_found(self) -> Self;
}

impl<R: Default> IgnoreKinds for Result<R, io::Error> {
    fn ignore_not_found(self) -> Self {
        match self {
            Ok(r) => Ok(r),
            Err(e) if io::ErrorKind::NotFound == e.kind() => Ok(R::default()),
            Err(e) => Err(e),
        }
    }
}

pub trait ErrorTransforms {
    type Coerced;
    fn on_not_found(self, error: Error) -> Self::Coerced;
}

impl<R, E: Into<Error>> ErrorTransforms for Result<R, E> {
    type Coerced = Result<R, Error>;

    fn on_not_found(self, error: Error) -> Result<R, Error> {
        match self.map_err(|e| e.into()) {
            Err(Error::Io(e)) if io::ErrorKind::NotFound == e.kind() => {
                Err(error)
            },
            Err(Error::Nix(nix::errno::Errno::ENOENT)) => Err(error),
            s => s,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn spit_refuses_existing() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("target");

        spit(root.path(), &path, 0o600, b"first").unwrap();
        let err = spit(root.path(), &path, 0o600, b"second").unwrap_err();
        assert_eq!(io::ErrorKind::AlreadyExists, err.kind());
        assert_eq!(b"first" as &[u8], &fs::read(&path).unwrap()[..]);

        // Only the target remains; no temporaries leaked.
        assert_eq!(1, fs::read_dir(root.path()).unwrap().count());
        assert_eq!(
            0o600,
            fs::metadata(&path).unwrap().permissions().mode() & 0o777
        );
    }

    #[test]
    fn error_transforms() {
        let root = tempfile::TempDir::new().unwrap();
        let missing = root.path().join("missing");

        assert_matches!(
            Err(Error::BadId(_)),
            fs::read(&missing).on_not_found(Error::BadId("x".to_owned()))
        );
        assert_matches!(Ok(()), fs::remove_file(&missing).ignore_not_found());
        assert_matches!(
            Err(Error::Io(_)),
            fs::read(root.path()).on_not_found(Error::BadId("x".to_owned()))
        );
    }
}
