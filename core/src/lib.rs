/*
 * lib.rs
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

//! Client engine for the small internet: Gemini, Gopher and Nimigem.
//!
//! Each protocol module exposes a single `fetch(target, options)` entry
//! point that opens a connection, writes one request, reads one bounded
//! response and returns it. Gemini and Nimigem run over TLS with a
//! trust policy that admits unexpired self-signed certificates; Gopher
//! runs over plain TCP. Redirects are followed within one scheme up to
//! a fixed hop cap, and every body read honours a size cap and a
//! wall-clock cap.

pub mod net;
pub mod protocol;
pub mod uri;

pub use net::ClientIdentity;
pub use protocol::error::{FetchError, ResourceLimit};
pub use protocol::{FetchOptions, Response};
