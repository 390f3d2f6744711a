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

//! Nimigem protocol engine: Gemini's experimental upload sibling.
//!
//! Framing extends Gemini with a second request line carrying the payload
//! as a base64 data URI, so a whole request is
//! `<uri>\r\ndata:<mime>;base64,<payload>\r\n`. The response header reads
//! like Gemini's, but the status table narrows: success is exactly code
//! 25 and its meta must be an absolute gemini URI naming where the
//! accepted payload ended up; 1x is invalid here.

use std::future::Future;
use std::time::Instant;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::net;
use crate::protocol::error::FetchError;
use crate::protocol::header::{read_status_header, StatusHeader};
use crate::protocol::{body, redirect, FetchOptions, NimigemResponse, Response};
use crate::uri;

/// Default Nimigem port, shared with Gemini.
pub const DEFAULT_PORT: u16 = 1965;

/// MIME type assumed when the response does not name one.
const DEFAULT_MIME: &str = "text/gemini";

/// Upload the payload in `options` to `target` over Nimigem.
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
            Outcome::Done(response) => return Ok(Response::Nimigem(response)),
            Outcome::Redirect(next) => {
                log::debug!("{} redirected to {}", current, next);
                current = next;
            }
        }
    }
}

enum Outcome {
    Done(NimigemResponse),
    Redirect(Url),
}

/// One upload round trip on an established stream.
async fn exchange<S>(
    stream: &mut S,
    target: &Url,
    options: &FetchOptions,
) -> Result<Outcome, FetchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = target.as_str().as_bytes().to_vec();
    request.extend_from_slice(b"\r\n");
    request.extend_from_slice(&payload_line(&options.payload, &options.payload_mime));
    stream
        .write_all(&request)
        .await
        .map_err(|e| FetchError::Connection(format!("write failed: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| FetchError::Connection(format!("write failed: {}", e)))?;

    let started = Instant::now();
    let header = read_status_header(stream, options.abandon_duration()).await?;

    match header.code_major {
        '1' => Err(FetchError::Protocol(format!(
            "invalid Nimigem 1x response code {}{}",
            header.code_major, header.code_minor
        ))),
        '2' => {
            if header.code_minor != '5' {
                return Err(FetchError::Protocol(format!(
                    "invalid Nimigem 2x response code {}{}",
                    header.code_major, header.code_minor
                )));
            }
            // success meta names where the accepted payload lives
            let published = Url::parse(&header.meta).map_err(|_| {
                FetchError::Protocol(format!(
                    "invalid Nimigem success, not a gemini target: {}",
                    header.meta
                ))
            })?;
            if published.scheme() != "gemini" {
                return Err(FetchError::Protocol(format!(
                    "invalid Nimigem success, not a gemini target: {}",
                    header.meta
                )));
            }
            let mut resp = response(header, target, Bytes::new());
            resp.mime = resp.meta.clone();
            Ok(Outcome::Done(resp))
        }
        '3' => Ok(Outcome::Redirect(redirect::resolve(target, &header.meta)?)),
        '4' | '5' | '6' => {
            // failure bodies are unspecified; drain under the caps and report the status line
            body::read_body(stream, started, options.max_body_kib, options.abandon_after_secs)
                .await?;
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

/// Payload framing: a data URI line, `data:<mime>;base64,<payload>` CR LF.
/// Spaces are stripped from the MIME type so it stays a single URI token.
fn payload_line(payload: &[u8], mime: &str) -> Vec<u8> {
    let mime = mime.replace(' ', "");
    let mut line = format!("data:{};base64,{}", mime, BASE64.encode(payload)).into_bytes();
    line.extend_from_slice(b"\r\n");
    line
}

fn response(header: StatusHeader, target: &Url, body: Bytes) -> NimigemResponse {
    NimigemResponse {
        code_major: header.code_major,
        code_minor: header.code_minor,
        meta: header.meta,
        uri: target.clone(),
        mime: DEFAULT_MIME.to_string(),
        encoding: "UTF-8".to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    #[test]
    fn payload_line_encodes_the_data_uri() {
        let line = payload_line(b"hello nimigem", "text/plain; charset=utf-8");
        assert_eq!(
            line,
            b"data:text/plain;charset=utf-8;base64,aGVsbG8gbmltaWdlbQ==\r\n".to_vec()
        );
    }

    #[test]
    fn empty_payload_still_frames_a_data_uri() {
        let line = payload_line(b"", "text/plain");
        assert_eq!(line, b"data:text/plain;base64,\r\n".to_vec());
    }

    async fn run(reply: &'static [u8]) -> (Result<Response, FetchError>, Vec<u8>) {
        let url = Url::parse("nimigem://example.org/post").unwrap();
        let mut options = FetchOptions::default();
        options.set_payload(b"note".to_vec(), "text/plain");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = fetch_with(&url, &options, |_host, _port: u16| {
            let tx = tx.clone();
            async move {
                let (client, mut server) = tokio::io::duplex(4096);
                tokio::spawn(async move {
                    let mut request = vec![0u8; 512];
                    let n = server.read(&mut request).await.unwrap();
                    tx.send(request[..n].to_vec()).unwrap();
                    server.write_all(reply).await.unwrap();
                });
                Ok(client)
            }
        })
        .await;
        let request = rx.recv().await.unwrap();
        (result, request)
    }

    #[tokio::test]
    async fn request_carries_uri_line_then_payload_line() {
        let (result, request) = run(b"25 gemini://example.org/post/1\r\n").await;
        assert_eq!(
            request,
            b"nimigem://example.org/post\r\ndata:text/plain;base64,bm90ZQ==\r\n".to_vec()
        );
        result.unwrap();
    }

    #[tokio::test]
    async fn success_meta_becomes_the_mime_and_body_is_empty() {
        let (result, _) = run(b"25 gemini://example.org/post/1\r\n").await;
        match result.unwrap() {
            Response::Nimigem(r) => {
                assert_eq!(r.code_major, '2');
                assert_eq!(r.code_minor, '5');
                assert_eq!(r.meta, "gemini://example.org/post/1");
                assert_eq!(r.mime, "gemini://example.org/post/1");
                assert!(r.body.is_empty());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn input_status_is_invalid_for_uploads() {
        let (result, _) = run(b"10 type something\r\n").await;
        assert!(matches!(result.unwrap_err(), FetchError::Protocol(_)));
    }

    #[tokio::test]
    async fn success_codes_other_than_25_are_invalid() {
        let (result, _) = run(b"20 text/gemini\r\n").await;
        assert!(matches!(result.unwrap_err(), FetchError::Protocol(_)));
    }

    #[tokio::test]
    async fn success_meta_must_be_an_absolute_gemini_uri() {
        let (result, _) = run(b"25 /relative/only\r\n").await;
        assert!(matches!(result.unwrap_err(), FetchError::Protocol(_)));
        let (result, _) = run(b"25 https://example.org/elsewhere\r\n").await;
        assert!(matches!(result.unwrap_err(), FetchError::Protocol(_)));
    }

    #[tokio::test]
    async fn failure_status_reports_the_status_line_as_body() {
        let (result, _) = run(b"44 slow down\r\n").await;
        match result.unwrap() {
            Response::Nimigem(r) => {
                assert_eq!(r.code_major, '4');
                assert_eq!(&r.body[..], b"44: slow down");
                assert_eq!(r.mime, "text/gemini");
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn redirect_repeats_the_upload_at_the_new_target() {
        let url = Url::parse("nimigem://example.org/inbox").unwrap();
        let mut options = FetchOptions::default();
        options.set_payload(b"note".to_vec(), "text/plain");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut served = 0u32;
        let result = fetch_with(&url, &options, |_host, _port: u16| {
            served += 1;
            let reply: &'static [u8] = if served == 1 {
                b"31 nimigem://example.org/inbox2\r\n"
            } else {
                b"25 gemini://example.org/inbox2/9\r\n"
            };
            let tx = tx.clone();
            async move {
                let (client, mut server) = tokio::io::duplex(4096);
                tokio::spawn(async move {
                    let mut request = vec![0u8; 512];
                    let n = server.read(&mut request).await.unwrap();
                    tx.send(request[..n].to_vec()).unwrap();
                    server.write_all(reply).await.unwrap();
                });
                Ok(client)
            }
        })
        .await;

        assert_eq!(served, 2);
        assert_eq!(
            rx.recv().await.unwrap(),
            b"nimigem://example.org/inbox\r\ndata:text/plain;base64,bm90ZQ==\r\n".to_vec()
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            b"nimigem://example.org/inbox2\r\ndata:text/plain;base64,bm90ZQ==\r\n".to_vec()
        );
        match result.unwrap() {
            Response::Nimigem(r) => assert_eq!(r.uri.as_str(), "nimigem://example.org/inbox2"),
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
