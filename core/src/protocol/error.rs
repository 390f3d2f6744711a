/*
 * error.rs
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

//! Fetch error taxonomy shared by all protocol engines.

use std::fmt;

/// Which per-fetch resource cap was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimit {
    /// Body size cap, in KiB.
    Size(u64),
    /// Wall-clock cap, in seconds.
    Time(u64),
}

/// Everything that can go wrong between "fetch called" and "response returned".
///
/// Variants distinguish causes a caller acts on differently: retrying a
/// `Connection` failure makes sense, retrying a `Protocol` violation does not.
#[derive(Debug)]
pub enum FetchError {
    /// Name resolution or TCP connect failed.
    Connection(String),
    /// TLS handshake or certificate trust failed.
    Authentication(String),
    /// Response header did not match the expected framing.
    MalformedResponse(String),
    /// Header framed correctly but its content violates the protocol.
    Protocol(String),
    /// Redirect target names a different scheme than the request.
    SchemeMismatch(String),
    /// More than the allowed number of redirect hops.
    TooManyRedirects,
    /// Body size or wall-clock cap exceeded mid-read.
    ResourceLimitExceeded(ResourceLimit),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FetchError::Connection(msg) => write!(f, "connection failure: {}", msg),
            FetchError::Authentication(msg) => write!(f, "authentication failure: {}", msg),
            FetchError::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
            FetchError::Protocol(msg) => write!(f, "{}", msg),
            FetchError::SchemeMismatch(scheme) => {
                write!(f, "cannot redirect to a URI with a different scheme: {}", scheme)
            }
            FetchError::TooManyRedirects => write!(f, "too many redirects"),
            FetchError::ResourceLimitExceeded(ResourceLimit::Size(kib)) => {
                write!(f, "abort due to resource exceeding max size ({}KiB)", kib)
            }
            FetchError::ResourceLimitExceeded(ResourceLimit::Time(secs)) => {
                write!(f, "abort due to resource exceeding time limit ({} seconds)", secs)
            }
        }
    }
}

impl std::error::Error for FetchError {}
