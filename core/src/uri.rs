/*
 * uri.rs
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

//! Endpoint resolution: which host and port a fetch actually dials.

use url::Url;

/// Resolve the TCP endpoint for `target`.
///
/// A proxy override of the form `host:port` replaces the target's own
/// authority entirely; the request line still carries the original URI.
/// Without a proxy the target's host is used, with `default_port` filling
/// in when the URI carries none.
pub fn endpoint(
    target: &Url,
    proxy: Option<&str>,
    default_port: u16,
) -> Result<(String, u16), String> {
    if let Some(proxy) = proxy {
        let (host, port) = proxy
            .rsplit_once(':')
            .ok_or_else(|| format!("invalid proxy {:?}, expected host:port", proxy))?;
        if host.is_empty() {
            return Err(format!("invalid proxy {:?}, expected host:port", proxy));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid proxy port in {:?}", proxy))?;
        return Ok((host.to_string(), port));
    }
    let host = target
        .host_str()
        .ok_or_else(|| format!("no host in {}", target))?
        .to_string();
    let port = target.port().unwrap_or(default_port);
    Ok((host, port))
}
