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

//! Encoding of the `.msaargs` file.
//!
//! The file starts with the line `msaargs 1`. Each argument follows as its
//! length in bytes (decimal), a colon, the UTF-8 bytes of the argument, and a
//! line feed. The explicit length means arguments may contain anything,
//! including line feeds and colons, while the file stays readable with a
//! pager.

use crate::support::error::Error;

const MAGIC: &[u8] = b"msaargs ";
const VERSION: &[u8] = b"1";

pub fn encode(args: &[String]) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        16 + args.iter().map(|a| a.len() + 8).sum::<usize>(),
    );
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(VERSION);
    out.push(b'\n');
    for arg in args {
        out.extend_from_slice(arg.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(arg.as_bytes());
        out.push(b'\n');
    }
    out
}

pub fn decode(mut data: &[u8]) -> Result<Vec<String>, Error> {
    let header_end = data
        .iter()
        .position(|&b| b'\n' == b)
        .ok_or(Error::MalformedArgs("missing header"))?;
    let header = &data[..header_end];
    if !header.starts_with(MAGIC) {
        return Err(Error::MalformedArgs("bad header"));
    }
    if VERSION != &header[MAGIC.len()..] {
        return Err(Error::MalformedArgs("unsupported version"));
    }
    data = &data[header_end + 1..];

    let mut args = Vec::new();
    while !data.is_empty() {
        let colon = data
            .iter()
            .take(20)
            .position(|&b| b':' == b)
            .ok_or(Error::MalformedArgs("missing length"))?;
        let len = std::str::from_utf8(&data[..colon])
            .ok()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(Error::MalformedArgs("bad length"))?;
        data = &data[colon + 1..];

        if data.len() <= len {
            return Err(Error::MalformedArgs("truncated argument"));
        }
        if b'\n' != data[len] {
            return Err(Error::MalformedArgs("missing terminator"));
        }

        let arg = std::str::from_utf8(&data[..len])
            .map_err(|_| Error::MalformedArgs("argument is not UTF-8"))?;
        args.push(arg.to_owned());
        data = &data[len + 1..];
    }

    Ok(args)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn readable_layout() {
        assert_eq!(
            b"msaargs 1\n16:user@example.com\n0:\n5:a\nb:c\n" as &[u8],
            &encode(&[
                "user@example.com".to_owned(),
                String::new(),
                "a\nb:c".to_owned(),
            ])[..]
        );
        assert_eq!(b"msaargs 1\n" as &[u8], &encode(&[])[..]);
    }

    #[test]
    fn rejects_garbage() {
        fn check(data: &[u8]) {
            assert_matches!(Err(Error::MalformedArgs(_)), decode(data));
        }

        check(b"");
        check(b"msaargs 1");
        check(b"msaargs 2\n");
        check(b"mailargs 1\n");
        check(b"msaargs 1\nfoo\n");
        check(b"msaargs 1\n:foo\n");
        check(b"msaargs 1\n+3:foo\n");
        check(b"msaargs 1\n4:foo\n");
        check(b"msaargs 1\n3:foo");
        check(b"msaargs 1\n2:foo\n");
        check(b"msaargs 1\n2:\xC3\x28\n");
        check(b"msaargs 1\n99999999999999999999999:x\n");
    }

    proptest! {
        #[test]
        fn encoding_is_reversible(args in prop::collection::vec(".*", 0..8)) {
            prop_assert_eq!(&args, &decode(&encode(&args)).unwrap());
        }
    }
}
