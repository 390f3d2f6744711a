/*
 * main.rs
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

//! Command-line fetcher for the small internet.
//!
//! One URL in, one response out: textual content is printed to stdout,
//! anything else is reported by media type. Flags expose the client
//! certificate, proxy override, insecure mode and the resource caps; a
//! missing URL argument prompts on stdin.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use smolnet_core::net::ClientIdentity;
use smolnet_core::protocol::{gemini, gopher, nimigem, FetchOptions, Response};
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use url::Url;

const DEFAULT_URL: &str = "gemini://geminiprotocol.net/docs/specification.gmi";

#[derive(Parser, Debug)]
#[command(name = "smolnet", version, about = "Fetch gemini://, gopher:// and nimigem:// URLs")]
struct Cli {
    /// Target URL; prompts on stdin when omitted
    url: Option<String>,

    /// Client certificate chain, PEM
    #[arg(long = "cert", requires = "key")]
    cert: Option<PathBuf>,

    /// Client certificate key, PEM
    #[arg(long = "key", requires = "cert")]
    key: Option<PathBuf>,

    /// Skip server certificate checks
    #[arg(long = "insecure")]
    insecure: bool,

    /// Connect via host:port instead of the target's own authority
    #[arg(long = "proxy")]
    proxy: Option<String>,

    /// Body size cap in KiB
    #[arg(long = "max-kib", default_value_t = smolnet_core::protocol::DEFAULT_MAX_BODY_KIB)]
    max_kib: u64,

    /// Wall-clock cap on one fetch, in seconds
    #[arg(long = "timeout-secs", default_value_t = smolnet_core::protocol::DEFAULT_ABANDON_SECS)]
    timeout_secs: u64,

    /// Payload text uploaded with a nimigem request
    #[arg(long = "payload")]
    payload: Option<String>,

    /// MIME type of the payload
    #[arg(long = "payload-mime", default_value = smolnet_core::protocol::DEFAULT_PAYLOAD_MIME)]
    payload_mime: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let target = match cli.url.clone() {
        Some(url) => url,
        None => match prompt_for_url() {
            Ok(url) => url,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    let target = match Url::parse(target.trim()) {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Invalid URL {:?}: {}", target, e);
            return ExitCode::FAILURE;
        }
    };

    let mut options = FetchOptions::default();
    options
        .set_insecure(cli.insecure)
        .set_max_body_kib(cli.max_kib)
        .set_abandon_after_secs(cli.timeout_secs);
    if let Some(proxy) = cli.proxy.clone() {
        options.set_proxy(proxy);
    }
    if let Some(payload) = cli.payload.clone() {
        options.set_payload(payload.into_bytes(), cli.payload_mime.clone());
    }
    if let (Some(cert), Some(key)) = (cli.cert.as_deref(), cli.key.as_deref()) {
        match load_identity(cert, key) {
            Ok(identity) => {
                options.set_client_identity(identity);
            }
            Err(e) => {
                eprintln!("Error loading client certificate: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let result = match target.scheme() {
        "gemini" => gemini::fetch(&target, &options).await,
        "gopher" => gopher::fetch(&target, &options).await,
        "nimigem" => nimigem::fetch(&target, &options).await,
        scheme => {
            log::error!("unknown URI scheme {:?}", scheme);
            eprintln!("Unknown URI scheme '{}'", scheme);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(response) => {
            render(&response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error loading page: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Ask for a URL on stdin; an empty line takes the default.
fn prompt_for_url() -> io::Result<String> {
    print!("URL [{}]: ", DEFAULT_URL);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim();
    if line.is_empty() {
        println!("No url was passed - showing a default uri: {}", DEFAULT_URL);
        Ok(DEFAULT_URL.to_string())
    } else {
        Ok(line.to_string())
    }
}

/// Load a PEM certificate chain and key from disk.
fn load_identity(cert: &Path, key: &Path) -> Result<ClientIdentity, String> {
    let chain: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(cert)
        .map_err(|e| format!("{}: {}", cert.display(), e))?
        .collect::<Result<_, _>>()
        .map_err(|e| format!("{}: {}", cert.display(), e))?;
    if chain.is_empty() {
        return Err(format!("{}: no certificates found", cert.display()));
    }
    let key_der =
        PrivateKeyDer::from_pem_file(key).map_err(|e| format!("{}: {}", key.display(), e))?;
    Ok(ClientIdentity::new(chain, key_der))
}

/// Render a response: textual bodies verbatim, everything else by type.
fn render(response: &Response) {
    if let Response::Nimigem(r) = response {
        // success meta is the published gemini URI, the one thing to show
        if r.code_major == '2' {
            println!("{}", r.meta);
            return;
        }
    }
    let mime = response.mime();
    if mime.starts_with("text/gemini")
        || mime.starts_with("application/gopher-menu")
        || mime.starts_with("text/plain")
    {
        if let Response::Gemini(r) = response {
            println!("{}", r.meta);
        }
        println!("{}", String::from_utf8_lossy(response.body()));
    } else {
        println!("Some {} content was received", mime);
    }
}
