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

use std::io::Write;

use log::error;

use super::store::Queue;
use crate::support::error::Error;

/// Write a human-readable summary of the queue to `out`, returning the
/// number of messages.
///
/// Messages whose details cannot be read are reported and shown with what
/// is known, rather than failing the whole listing.
pub fn list_queue(queue: &Queue, out: &mut impl Write) -> Result<usize, Error> {
    let ids = queue.list_ids()?;
    match ids.len() {
        0 => writeln!(out, "Queue is empty.")?,
        1 => writeln!(out, "1 message in queue:")?,
        n => writeln!(out, "{} messages in queue:", n)?,
    }

    for &id in &ids {
        match queue.metadata(id) {
            Ok(md) => {
                writeln!(
                    out,
                    "{}  {}  {:>8}  To: {}",
                    id,
                    md.created_at.format("%Y-%m-%d %H:%M"),
                    format_size(md.size),
                    md.to.as_deref().unwrap_or("(unknown)"),
                )?;
                writeln!(
                    out,
                    "          Subject: {}",
                    md.subject.as_deref().unwrap_or("(none)"),
                )?;
            },
            Err(e) => {
                error!("{}: {}", id, e);
                writeln!(out, "{}  (unreadable: {})", id, e)?;
            },
        }
    }

    out.flush()?;
    Ok(ids.len())
}

fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{} B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1} KiB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MiB", size as f64 / (1024.0 * 1024.0))
    }
}
