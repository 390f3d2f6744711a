/*
 * net.rs
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

//! Connection plumbing: TCP dial, TLS upgrade and the certificate trust
//! policy for the small net.
//!
//! Chain validation runs against the platform trust store (webpki-roots as
//! fallback). Much of Geminispace serves self-signed certificates, so a
//! chain that fails only because its issuer is unknown is admitted while
//! the leaf is unexpired; `insecure` switches checking off entirely. Expiry
//! is read straight from the leaf's DER, the one X.509 field the policy
//! needs beyond what rustls reports.

use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::client::{ClientConfig, WebPkiServerVerifier};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    CertificateError, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
};
use tokio_rustls::TlsConnector;

/// Client-side TLS stream over TCP.
pub type TlsStream = TokioTlsStream<TcpStream>;

/// TCP connect timeout. Read deadlines come from per-fetch options; the
/// connect phase uses this fixed cap.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client certificate chain and key, presented when the server requests
/// client auth during the handshake.
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    pub fn new(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        ClientIdentity { chain, key }
    }
}

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(_) => {}
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

static WEBPKI: OnceLock<Arc<WebPkiServerVerifier>> = OnceLock::new();

/// Chain verifier over the default root store, built once per process.
fn webpki_verifier() -> Arc<WebPkiServerVerifier> {
    WEBPKI
        .get_or_init(|| {
            WebPkiServerVerifier::builder(Arc::new(build_root_store()))
                .build()
                .expect("root store is never empty")
        })
        .clone()
}

/// How a presented server certificate came to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trust {
    /// Chain verified against the root store.
    Chain,
    /// Self-signed or unknown issuer, admitted because the leaf is unexpired.
    SelfSigned,
    /// Insecure mode, nothing checked.
    Bypassed,
}

/// Trust decision as a pure function of its inputs.
///
/// `verdict` is the chain validation outcome, `leaf_not_after` the leaf's
/// notAfter as a Unix timestamp when it could be parsed. A verdict that
/// failed only for an unknown issuer is accepted while the leaf is
/// unexpired; everything else fails as reported.
pub(crate) fn decide_trust(
    insecure: bool,
    verdict: Result<(), TlsError>,
    leaf_not_after: Option<i64>,
    now_secs: i64,
) -> Result<Trust, TlsError> {
    if insecure {
        return Ok(Trust::Bypassed);
    }
    match verdict {
        Ok(()) => Ok(Trust::Chain),
        Err(TlsError::InvalidCertificate(CertificateError::UnknownIssuer)) => match leaf_not_after {
            Some(not_after) if not_after >= now_secs => Ok(Trust::SelfSigned),
            Some(_) => Err(TlsError::InvalidCertificate(CertificateError::Expired)),
            None => Err(TlsError::InvalidCertificate(CertificateError::BadEncoding)),
        },
        Err(err) => Err(err),
    }
}

/// Server certificate verifier applying [`decide_trust`] on top of webpki.
#[derive(Debug)]
struct CertPolicy {
    insecure: bool,
    webpki: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for CertPolicy {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let verdict = self
            .webpki
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            .map(|_| ());
        let not_after = certificate_not_after(end_entity.as_ref());
        match decide_trust(self.insecure, verdict, not_after, now.as_secs() as i64)? {
            Trust::SelfSigned => {
                log::warn!("{:?}: trusting unexpired self-signed certificate", server_name);
            }
            Trust::Chain | Trust::Bypassed => {}
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        if self.insecure {
            return Ok(HandshakeSignatureValid::assertion());
        }
        self.webpki.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        if self.insecure {
            return Ok(HandshakeSignatureValid::assertion());
        }
        self.webpki.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.webpki.supported_verify_schemes()
    }
}

/// TLS client config for one fetch.
fn client_config(
    insecure: bool,
    identity: Option<&ClientIdentity>,
) -> io::Result<Arc<ClientConfig>> {
    let policy = Arc::new(CertPolicy {
        insecure,
        webpki: webpki_verifier(),
    });
    let builder = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(policy);
    let config = match identity {
        Some(identity) => builder
            .with_client_auth_cert(identity.chain.clone(), identity.key.clone_key())
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid client certificate: {}", e),
                )
            })?,
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

/// Open a TCP connection to `host:port`.
pub async fn connect_tcp(host: &str, port: u16) -> io::Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(stream) => stream,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out", addr),
        )),
    }
}

/// Upgrade an open TCP stream to TLS against `server_name`.
pub async fn upgrade_tls(
    stream: TcpStream,
    server_name: &str,
    insecure: bool,
    identity: Option<&ClientIdentity>,
) -> io::Result<TlsStream> {
    let config = client_config(insecure, identity)?;
    let name = ServerName::try_from(server_name.to_string()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid server name {:?}", server_name),
        )
    })?;
    let connector = TlsConnector::from(config);
    connector.connect(name, stream).await
}

/// Read into `buf`, failing with `TimedOut` when nothing arrives within `limit`.
pub async fn read_with_deadline<S>(
    stream: &mut S,
    buf: &mut [u8],
    limit: Duration,
) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    match tokio::time::timeout(limit, stream.read(buf)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
    }
}

const DER_INTEGER: u8 = 0x02;
const DER_UTC_TIME: u8 = 0x17;
const DER_GENERALIZED_TIME: u8 = 0x18;
const DER_SEQUENCE: u8 = 0x30;
const DER_CONTEXT_0: u8 = 0xa0;

/// Read one DER TLV at `pos`, returning the tag and value and advancing past it.
fn der_tlv<'a>(input: &'a [u8], pos: &mut usize) -> Option<(u8, &'a [u8])> {
    let tag = *input.get(*pos)?;
    *pos += 1;
    let first = *input.get(*pos)?;
    *pos += 1;
    let len = if first < 0x80 {
        first as usize
    } else {
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 {
            return None;
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | *input.get(*pos)? as usize;
            *pos += 1;
        }
        len
    };
    let value = input.get(*pos..*pos + len)?;
    *pos += len;
    Some((tag, value))
}

/// Extract notAfter from a DER-encoded X.509 certificate as a Unix timestamp.
///
/// Walks Certificate -> TBSCertificate -> validity -> notAfter; everything
/// after the validity sequence is ignored.
pub(crate) fn certificate_not_after(der: &[u8]) -> Option<i64> {
    let mut pos = 0;
    let (tag, certificate) = der_tlv(der, &mut pos)?;
    if tag != DER_SEQUENCE {
        return None;
    }
    let mut pos = 0;
    let (tag, tbs) = der_tlv(certificate, &mut pos)?;
    if tag != DER_SEQUENCE {
        return None;
    }
    let mut pos = 0;
    let (tag, _first) = der_tlv(tbs, &mut pos)?;
    // version is optional; when present it is an explicit [0] wrapper before the serial
    let serial_tag = if tag == DER_CONTEXT_0 {
        der_tlv(tbs, &mut pos)?.0
    } else {
        tag
    };
    if serial_tag != DER_INTEGER {
        return None;
    }
    let (tag, _signature_alg) = der_tlv(tbs, &mut pos)?;
    if tag != DER_SEQUENCE {
        return None;
    }
    let (tag, _issuer) = der_tlv(tbs, &mut pos)?;
    if tag != DER_SEQUENCE {
        return None;
    }
    let (tag, validity) = der_tlv(tbs, &mut pos)?;
    if tag != DER_SEQUENCE {
        return None;
    }
    let mut pos = 0;
    let _not_before = der_tlv(validity, &mut pos)?;
    let (tag, not_after) = der_tlv(validity, &mut pos)?;
    asn1_time_to_epoch(tag, not_after)
}

/// Decode an ASN.1 UTCTime or GeneralizedTime value to a Unix timestamp.
fn asn1_time_to_epoch(tag: u8, value: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(value).ok()?;
    // the fixed-position slicing below requires single-byte characters
    if !text.is_ascii() {
        return None;
    }
    let text = text.strip_suffix('Z')?;
    let (year, rest) = match tag {
        DER_UTC_TIME => {
            if text.len() != 12 {
                return None;
            }
            let yy: i32 = text[..2].parse().ok()?;
            // RFC 5280 two-digit year pivot
            let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
            (year, &text[2..])
        }
        DER_GENERALIZED_TIME => {
            if text.len() != 14 {
                return None;
            }
            (text[..4].parse().ok()?, &text[4..])
        }
        _ => return None,
    };
    let month: u32 = rest[..2].parse().ok()?;
    let day: u32 = rest[2..4].parse().ok()?;
    let hour: u32 = rest[4..6].parse().ok()?;
    let minute: u32 = rest[6..8].parse().ok()?;
    let second: u32 = rest[8..10].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(NaiveDateTime::new(date, time).and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        let len = value.len();
        if len < 0x80 {
            out.push(len as u8);
        } else if len <= 0xff {
            out.push(0x81);
            out.push(len as u8);
        } else {
            out.push(0x82);
            out.push((len >> 8) as u8);
            out.push(len as u8);
        }
        out.extend_from_slice(value);
        out
    }

    fn certificate(
        with_version: bool,
        issuer: &[u8],
        not_after_tag: u8,
        not_after: &[u8],
    ) -> Vec<u8> {
        let validity =
            [tlv(DER_UTC_TIME, b"240101000000Z"), tlv(not_after_tag, not_after)].concat();
        let mut tbs = Vec::new();
        if with_version {
            tbs.extend_from_slice(&tlv(DER_CONTEXT_0, &tlv(DER_INTEGER, &[2])));
        }
        tbs.extend_from_slice(&tlv(DER_INTEGER, &[1]));
        tbs.extend_from_slice(&tlv(DER_SEQUENCE, &[]));
        tbs.extend_from_slice(&tlv(DER_SEQUENCE, issuer));
        tbs.extend_from_slice(&tlv(DER_SEQUENCE, &validity));
        let body = [tlv(DER_SEQUENCE, &tbs), tlv(DER_SEQUENCE, &[]), tlv(0x03, &[0])].concat();
        tlv(DER_SEQUENCE, &body)
    }

    fn epoch(year: i32, month: u32, day: u32, hour: u32) -> i64 {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
    }

    #[test]
    fn not_after_from_utc_time() {
        let der = certificate(true, &[], DER_UTC_TIME, b"310615120000Z");
        assert_eq!(certificate_not_after(&der), Some(epoch(2031, 6, 15, 12)));
    }

    #[test]
    fn not_after_from_generalized_time() {
        let der = certificate(true, &[], DER_GENERALIZED_TIME, b"20510615120000Z");
        assert_eq!(certificate_not_after(&der), Some(epoch(2051, 6, 15, 12)));
    }

    #[test]
    fn not_after_without_version_field() {
        let der = certificate(false, &[], DER_UTC_TIME, b"310615120000Z");
        assert_eq!(certificate_not_after(&der), Some(epoch(2031, 6, 15, 12)));
    }

    #[test]
    fn not_after_with_long_form_issuer() {
        let issuer = tlv(0x0c, &[b'x'; 300]);
        let der = certificate(true, &issuer, DER_UTC_TIME, b"310615120000Z");
        assert_eq!(certificate_not_after(&der), Some(epoch(2031, 6, 15, 12)));
    }

    #[test]
    fn two_digit_years_pivot_at_fifty() {
        let der = certificate(true, &[], DER_UTC_TIME, b"490101000000Z");
        assert_eq!(certificate_not_after(&der), Some(epoch(2049, 1, 1, 0)));
        let der = certificate(true, &[], DER_UTC_TIME, b"500101000000Z");
        assert_eq!(certificate_not_after(&der), Some(epoch(1950, 1, 1, 0)));
    }

    #[test]
    fn truncated_der_yields_none() {
        let der = certificate(true, &[], DER_UTC_TIME, b"310615120000Z");
        assert_eq!(certificate_not_after(&der[..der.len() / 2]), None);
        assert_eq!(certificate_not_after(&[]), None);
        assert_eq!(certificate_not_after(&[0x04, 0x02, 0x00, 0x00]), None);
    }

    #[test]
    fn malformed_time_yields_none() {
        // missing trailing Z
        let der = certificate(true, &[], DER_UTC_TIME, b"310615120000");
        assert_eq!(certificate_not_after(&der), None);
        // month out of range
        let der = certificate(true, &[], DER_UTC_TIME, b"311315120000Z");
        assert_eq!(certificate_not_after(&der), None);
    }

    #[test]
    fn non_ascii_time_yields_none() {
        // multibyte characters sitting across the fixed digit positions
        let der = certificate(true, &[], DER_UTC_TIME, b"a\xc2\xa1010100000Z");
        assert_eq!(certificate_not_after(&der), None);
        let der = certificate(true, &[], DER_GENERALIZED_TIME, b"202\xc2\xa1101000000Z");
        assert_eq!(certificate_not_after(&der), None);
    }

    fn unknown_issuer() -> TlsError {
        TlsError::InvalidCertificate(CertificateError::UnknownIssuer)
    }

    #[test]
    fn valid_chain_is_trusted() {
        let trust = decide_trust(false, Ok(()), Some(0), 100).unwrap();
        assert_eq!(trust, Trust::Chain);
    }

    #[test]
    fn unexpired_self_signed_is_trusted() {
        let trust = decide_trust(false, Err(unknown_issuer()), Some(200), 100).unwrap();
        assert_eq!(trust, Trust::SelfSigned);
    }

    #[test]
    fn expired_self_signed_is_rejected() {
        let err = decide_trust(false, Err(unknown_issuer()), Some(99), 100).unwrap_err();
        assert!(matches!(
            err,
            TlsError::InvalidCertificate(CertificateError::Expired)
        ));
    }

    #[test]
    fn unreadable_expiry_is_rejected() {
        let err = decide_trust(false, Err(unknown_issuer()), None, 100).unwrap_err();
        assert!(matches!(err, TlsError::InvalidCertificate(_)));
    }

    #[test]
    fn other_chain_errors_pass_through() {
        let verdict = Err(TlsError::InvalidCertificate(CertificateError::NotValidForName));
        let err = decide_trust(false, verdict, Some(200), 100).unwrap_err();
        assert!(matches!(
            err,
            TlsError::InvalidCertificate(CertificateError::NotValidForName)
        ));
    }

    #[test]
    fn insecure_bypasses_every_check() {
        let verdict = Err(TlsError::InvalidCertificate(CertificateError::Expired));
        let trust = decide_trust(true, verdict, Some(0), 100).unwrap();
        assert_eq!(trust, Trust::Bypassed);
    }
}
