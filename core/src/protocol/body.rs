/*
 * body.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Smolnet, a client for small-internet protocols.
 *
 * Smolnet is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Smolnet is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Smolnet.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Bounded read-until-close.
//!
//! Server close is the only end-of-body signal in these protocols, so the
//! body is read in fixed chunks until EOF with two caps enforced on the
//! way: total size and wall clock. The size check runs after each chunk is
//! appended, so a response may overshoot the cap by at most one chunk
//! before the fetch aborts.

use std::io;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;

use crate::net::read_with_deadline;
use crate::protocol::error::{FetchError, ResourceLimit};

/// Read chunk size in bytes.
pub const CHUNK_SIZE: usize = 2048;

/// Read until the server closes, within the caps.
///
/// `started` anchors the wall clock; callers start it before the first read
/// of the response so header time counts against the same window.
pub async fn read_body<S>(
    stream: &mut S,
    started: Instant,
    max_body_kib: u64,
    abandon_after_secs: u64,
) -> Result<Bytes, FetchError>
where
    S: AsyncRead + Unpin,
{
    let abandon_at = started + std::time::Duration::from_secs(abandon_after_secs);
    let max_bytes = max_body_kib * 1024;
    let time_exceeded =
        || FetchError::ResourceLimitExceeded(ResourceLimit::Time(abandon_after_secs));

    let mut body = BytesMut::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let remaining = abandon_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(time_exceeded());
        }
        let n = match read_with_deadline(stream, &mut chunk, remaining).await {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(time_exceeded()),
            Err(e) => return Err(FetchError::Connection(format!("read failed: {}", e))),
        };
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
        if body.len() as u64 > max_bytes {
            return Err(FetchError::ResourceLimitExceeded(ResourceLimit::Size(max_body_kib)));
        }
    }
    Ok(body.freeze())
}
