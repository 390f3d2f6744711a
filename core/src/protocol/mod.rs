/*
 * mod.rs
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

//! Protocol engines and the pieces they share.
//!
//! One module per protocol, each with a single async `fetch(target, options)`
//! entry point. The request/response pattern is the same everywhere: write
//! one request line, read one response, close. Gemini and Nimigem frame the
//! response with a `<status><SP><meta>` header line; Gopher sends a bare
//! body. Shared concerns live beside the engines: `header` parses the status
//! line, `body` reads until close under the resource caps, `redirect`
//! resolves and polices redirect targets.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

pub mod body;
pub mod error;
pub mod gemini;
pub mod gopher;
pub mod header;
pub mod nimigem;
pub mod redirect;

pub use error::{FetchError, ResourceLimit};

/// Default body size cap in KiB.
pub const DEFAULT_MAX_BODY_KIB: u64 = 2048;

/// Default wall-clock cap on one fetch, in seconds.
pub const DEFAULT_ABANDON_SECS: u64 = 5;

/// Default MIME type for an uploaded Nimigem payload.
pub const DEFAULT_PAYLOAD_MIME: &str = "text/plain; charset=utf-8";

/// Per-fetch options. `Default` gives an anonymous, certificate-checking
/// fetch with the standard caps and an empty payload.
pub struct FetchOptions {
    /// Certificate and key presented if the server requests client auth.
    pub client_identity: Option<crate::net::ClientIdentity>,
    /// `host:port` override; when set, all connections go here instead of
    /// the target's own authority.
    pub proxy: Option<String>,
    /// Skip all server certificate checks.
    pub insecure: bool,
    /// Body size cap in KiB.
    pub max_body_kib: u64,
    /// Wall-clock cap on the whole response read, in seconds.
    pub abandon_after_secs: u64,
    /// Upload payload (Nimigem only; ignored elsewhere).
    pub payload: Vec<u8>,
    /// MIME type of the upload payload.
    pub payload_mime: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            client_identity: None,
            proxy: None,
            insecure: false,
            max_body_kib: DEFAULT_MAX_BODY_KIB,
            abandon_after_secs: DEFAULT_ABANDON_SECS,
            payload: Vec::new(),
            payload_mime: DEFAULT_PAYLOAD_MIME.to_string(),
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        FetchOptions::default()
    }

    pub fn set_client_identity(&mut self, identity: crate::net::ClientIdentity) -> &mut Self {
        self.client_identity = Some(identity);
        self
    }

    pub fn set_proxy(&mut self, proxy: impl Into<String>) -> &mut Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn set_insecure(&mut self, insecure: bool) -> &mut Self {
        self.insecure = insecure;
        self
    }

    pub fn set_max_body_kib(&mut self, kib: u64) -> &mut Self {
        self.max_body_kib = kib;
        self
    }

    pub fn set_abandon_after_secs(&mut self, secs: u64) -> &mut Self {
        self.abandon_after_secs = secs;
        self
    }

    pub fn set_payload(&mut self, payload: Vec<u8>, mime: impl Into<String>) -> &mut Self {
        self.payload = payload;
        self.payload_mime = mime.into();
        self
    }

    /// Wall-clock cap as a [`Duration`].
    pub fn abandon_duration(&self) -> Duration {
        Duration::from_secs(self.abandon_after_secs)
    }
}

/// One Gemini response: status, meta and body.
#[derive(Debug, Clone)]
pub struct GeminiResponse {
    /// First status digit; the class ('1' input, '2' success, '3' redirect,
    /// '4'/'5'/'6' failures).
    pub code_major: char,
    /// Second status digit.
    pub code_minor: char,
    /// Header text after the status code.
    pub meta: String,
    /// URI this response was served for, after any redirects.
    pub uri: Url,
    /// MIME type of the body.
    pub mime: String,
    /// Character encoding of a textual body.
    pub encoding: String,
    /// Response body. Failure statuses carry the rendered status line.
    pub body: Bytes,
}

impl fmt::Display for GeminiResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}: {}", self.code_major, self.code_minor, self.meta)
    }
}

/// One Nimigem response. Same framing as Gemini; success is always code 25
/// with the published URI in `meta` and an empty body.
#[derive(Debug, Clone)]
pub struct NimigemResponse {
    pub code_major: char,
    pub code_minor: char,
    pub meta: String,
    pub uri: Url,
    pub mime: String,
    pub encoding: String,
    pub body: Bytes,
}

impl fmt::Display for NimigemResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}: {}", self.code_major, self.code_minor, self.meta)
    }
}

/// One Gopher response: a bare body, typed from the request selector.
#[derive(Debug, Clone)]
pub struct GopherResponse {
    /// URI this response was served for.
    pub uri: Url,
    /// MIME type derived from the selector type and path extension.
    pub mime: String,
    /// Character encoding of a textual body.
    pub encoding: String,
    /// Response body.
    pub body: Bytes,
}

/// What a fetch returns, one variant per protocol.
#[derive(Debug, Clone)]
pub enum Response {
    Gemini(GeminiResponse),
    Gopher(GopherResponse),
    Nimigem(NimigemResponse),
}

impl Response {
    /// URI this response was served for, after any redirects.
    pub fn uri(&self) -> &Url {
        match self {
            Response::Gemini(r) => &r.uri,
            Response::Gopher(r) => &r.uri,
            Response::Nimigem(r) => &r.uri,
        }
    }

    /// MIME type of the body.
    pub fn mime(&self) -> &str {
        match self {
            Response::Gemini(r) => &r.mime,
            Response::Gopher(r) => &r.mime,
            Response::Nimigem(r) => &r.mime,
        }
    }

    /// Character encoding of a textual body.
    pub fn encoding(&self) -> &str {
        match self {
            Response::Gemini(r) => &r.encoding,
            Response::Gopher(r) => &r.encoding,
            Response::Nimigem(r) => &r.encoding,
        }
    }

    /// Response body bytes.
    pub fn body(&self) -> &[u8] {
        match self {
            Response::Gemini(r) => &r.body,
            Response::Gopher(r) => &r.body,
            Response::Nimigem(r) => &r.body,
        }
    }
}
