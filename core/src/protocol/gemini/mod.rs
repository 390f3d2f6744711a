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

//! Gemini protocol engine.
//!
//! One TLS connection per request: write the absolute URI and CR LF, read
//! a `<status><SP><meta>` header line, then a body until close when the
//! status class says one follows. Status class '1' prompts for input, '2'
//! succeeds with `meta` as the body's MIME type, '3' redirects (followed
//! here, same scheme only, capped hops), '4'/'5'/'6' are failures reported
//! with the status line as the body.

use std::future::Future;
use std::time::Instant;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::net;
use crate::protocol::error::FetchError;
use crate::protocol::header::{read_status_header, StatusHeader};
use crate::protocol::{body, redirect, FetchOptions, GeminiResponse, Response};
use crate::uri;

/// Default Gemini port.
pub const DEFAULT_PORT: u16 = 1965;

/// MIME type assumed when the response does not name one.
const DEFAULT_MIME: &str = "text/gemini";

/// Fetch `target` over Gemini.
pub async fn fetch(target: &Url, options: &FetchOptions) -> Result<Response, FetchError> {
    fetch_with(target, options, |host: String, port: u16| async move {
        let stream = net::connect_tcp(&host, port).await.map_err(|e| {
            log::error!("connect to {}:{} failed: {}", host, port, e);
            FetchError::Connection(e.to_string())
        })?;
        net::upgrade_tls(stream, &host, options.insecure, options.client_identity.as_ref())
            .await
            .map_err(|e| FetchError::Authentication(e.to_string()))
    })
    .await
}

/// Fetch loop over an arbitrary connect function, used directly by tests.
async fn fetch_with<S, C, Fut>(
    target: &Url,
    options: &FetchOptions,
    mut connect: C,
) -> Result<Response, FetchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: FnMut(String, u16) -> Fut,
    Fut: Future<Output = Result<S, FetchError>>,
{
    let mut current = target.clone();
    let mut attempts = 0u32;
    loop {
        if attempts >= redirect::MAX_REDIRECTS {
            return Err(FetchError::TooManyRedirects);
        }
        attempts += 1;

        let (host, port) = uri::endpoint(&current, options.proxy.as_deref(), DEFAULT_PORT)
            .map_err(FetchError::Connection)?;
        let mut stream = connect(host, port).await?;

        match exchange(&mut stream, &current, options).await? {
            Outcome::Done(response) => return Ok(Response::Gemini(response)),
            Outcome::Redirect(next) => {
                log::debug!("{} redirected to {}", current, next);
                current = next;
            }
        }
    }
}

enum Outcome {
    Done(GeminiResponse),
    Redirect(Url),
}

/// One request/response round trip on an established stream.
async fn exchange<S>(
    stream: &mut S,
    target: &Url,
    options: &FetchOptions,
) -> Result<Outcome, FetchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_request(stream, target).await?;

    let started = Instant::now();
    let header = read_status_header(stream, options.abandon_duration()).await?;
    let (max_kib, abandon_secs) = (options.max_body_kib, options.abandon_after_secs);

    match header.code_major {
        '1' => Ok(Outcome::Done(response(header, target, Bytes::new()))),
        '2' => {
            let body = body::read_body(stream, started, max_kib, abandon_secs).await?;
            Ok(Outcome::Done(response(header, target, body)))
        }
        '3' => Ok(Outcome::Redirect(redirect::resolve(target, &header.meta)?)),
        '4' | '5' | '6' => {
            // failure bodies are unspecified; drain under the caps and report the status line
            body::read_body(stream, started, max_kib, abandon_secs).await?;
            let mut resp = response(header, target, Bytes::new());
            resp.body = Bytes::from(resp.to_string().into_bytes());
            Ok(Outcome::Done(resp))
        }
        code => {
            log::warn!("{}: invalid response code {}{}", target, code, header.code_minor);
            Err(FetchError::Protocol(format!(
                "invalid response code {}{}",
                code, header.code_minor
            )))
        }
    }
}

/// Request framing: the absolute URI, CR LF.
async fn write_request<S>(stream: &mut S, target: &Url) -> Result<(), FetchError>
where
    S: AsyncWrite + Unpin,
{
    let mut line = target.as_str().as_bytes().to_vec();
    line.extend_from_slice(b"\r\n");
    stream
        .write_all(&line)
        .await
        .map_err(|e| FetchError::Connection(format!("write failed: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| FetchError::Connection(format!("write failed: {}", e)))
}

fn response(header: StatusHeader, target: &Url, body: Bytes) -> GeminiResponse {
    let mime = if header.code_major == '2' && !header.meta.is_empty() {
        header.meta.clone()
    } else {
        DEFAULT_MIME.to_string()
    };
    GeminiResponse {
        code_major: header.code_major,
        code_minor: header.code_minor,
        meta: header.meta,
        uri: target.clone(),
        mime,
        encoding: "UTF-8".to_string(),
        body,
    }
}
