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

//! Gopher protocol engine.
//!
//! Plain TCP, no response framing at all: write the selector and CR LF,
//! read until close. The URI path encodes both the item type and the
//! selector (`/1foo` is a type-'1' item with selector `foo`); the type
//! character plus the path extension decide the MIME type, since nothing
//! in the response does.

use std::future::Future;
use std::time::Instant;

use percent_encoding::percent_decode;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::net;
use crate::protocol::error::FetchError;
use crate::protocol::{body, FetchOptions, GopherResponse, Response};
use crate::uri;

pub mod mime;

/// Default Gopher port.
pub const DEFAULT_PORT: u16 = 70;

/// Fetch `target` over Gopher.
pub async fn fetch(target: &Url, options: &FetchOptions) -> Result<Response, FetchError> {
    fetch_with(target, options, |host: String, port: u16| async move {
        net::connect_tcp(&host, port).await.map_err(|e| {
            log::error!("connect to {}:{} failed: {}", host, port, e);
            FetchError::Connection(e.to_string())
        })
    })
    .await
}

/// Fetch over an arbitrary connect function, used directly by tests.
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
    let (host, port) = uri::endpoint(target, options.proxy.as_deref(), DEFAULT_PORT)
        .map_err(FetchError::Connection)?;
    let mut stream = connect(host, port).await?;

    let (item_type, selector) = selector_for(target);
    let mut request = selector;
    request.extend_from_slice(b"\r\n");
    stream
        .write_all(&request)
        .await
        .map_err(|e| FetchError::Connection(format!("write failed: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| FetchError::Connection(format!("write failed: {}", e)))?;

    let started = Instant::now();
    let body = body::read_body(
        &mut stream,
        started,
        options.max_body_kib,
        options.abandon_after_secs,
    )
    .await?;

    Ok(Response::Gopher(GopherResponse {
        uri: target.clone(),
        mime: mime::resolve(item_type, target.path()),
        encoding: "UTF-8".to_string(),
        body,
    }))
}

/// Split the URI path into item type and decoded selector.
///
/// An empty or bare `/` path addresses the server's root menu: type '1'
/// with an empty selector. Otherwise the first path byte after the slash
/// is the type and the rest, percent-decoded, is the selector.
fn selector_for(target: &Url) -> (char, Vec<u8>) {
    let path = target.path().as_bytes();
    if path.len() <= 1 {
        ('1', Vec::new())
    } else {
        (path[1] as char, percent_decode(&path[2..]).collect())
    }
}
