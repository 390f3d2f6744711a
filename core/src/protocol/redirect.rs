/*
 * redirect.rs
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

//! Redirect target resolution.
//!
//! A 3x meta names the next target, absolute or relative to the current
//! URI. Redirects never cross schemes; cross-protocol hops (and the
//! gemini-to-http trick some servers try) fail the fetch.

use url::Url;

use crate::protocol::error::FetchError;

/// Redirect hops followed before a fetch gives up.
pub const MAX_REDIRECTS: u32 = 5;

/// Resolve a redirect `meta` against the current target.
pub fn resolve(current: &Url, meta: &str) -> Result<Url, FetchError> {
    let next = if meta.contains("://") {
        Url::parse(meta)
    } else {
        current.join(meta)
    }
    .map_err(|e| FetchError::Protocol(format!("invalid redirect target {:?}: {}", meta, e)))?;

    if next.scheme() != current.scheme() {
        return Err(FetchError::SchemeMismatch(next.scheme().to_string()));
    }
    Ok(next)
}
