/*
 * header.rs
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

//! Status header parsing for Gemini-family responses.
//!
//! The header is one line: two status bytes, a space, free-form meta text,
//! CR LF. Read byte by byte; anything that deviates is malformed and the
//! fetch fails rather than guessing at recovery.

use std::io;
use std::time::Duration;

use tokio::io::AsyncRead;

use crate::net::read_with_deadline;
use crate::protocol::error::{FetchError, ResourceLimit};

/// Parsed `<status><SP><meta>` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusHeader {
    pub code_major: char,
    pub code_minor: char,
    /// Text after the status code, leading whitespace trimmed.
    pub meta: String,
}

/// Read one byte under the deadline; `Ok(None)` on clean EOF.
async fn next_byte<S>(stream: &mut S, deadline: Duration) -> Result<Option<u8>, FetchError>
where
    S: AsyncRead + Unpin,
{
    let mut byte = [0u8; 1];
    match read_with_deadline(stream, &mut byte, deadline).await {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(byte[0])),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(FetchError::ResourceLimitExceeded(
            ResourceLimit::Time(deadline.as_secs()),
        )),
        Err(e) => Err(FetchError::Connection(format!("read failed: {}", e))),
    }
}

/// Read and parse the response header line.
pub async fn read_status_header<S>(
    stream: &mut S,
    deadline: Duration,
) -> Result<StatusHeader, FetchError>
where
    S: AsyncRead + Unpin,
{
    let mut status = [0u8; 2];
    for slot in status.iter_mut() {
        *slot = next_byte(stream, deadline)
            .await?
            .ok_or_else(|| FetchError::MalformedResponse("no status code".to_string()))?;
    }

    match next_byte(stream, deadline).await? {
        Some(b' ') => {}
        _ => {
            return Err(FetchError::MalformedResponse(
                "missing space after status code".to_string(),
            ))
        }
    }

    let mut meta = Vec::new();
    loop {
        match next_byte(stream, deadline).await? {
            Some(b'\r') => match next_byte(stream, deadline).await? {
                Some(b'\n') => break,
                _ => {
                    return Err(FetchError::MalformedResponse(
                        "missing LF after CR".to_string(),
                    ))
                }
            },
            Some(byte) => meta.push(byte),
            None => {
                return Err(FetchError::MalformedResponse(
                    "header ended before CRLF".to_string(),
                ))
            }
        }
    }

    Ok(StatusHeader {
        code_major: status[0] as char,
        code_minor: status[1] as char,
        meta: String::from_utf8_lossy(&meta).trim_start().to_string(),
    })
}
