//! Turns the presented certificate chain into [`Certificate`] records.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use openssl::asn1::{Asn1Object, Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::x509::X509Ref;
use std::net::{Ipv4Addr, Ipv6Addr};
use x509_parser::oid_registry::OID_PKCS1_RSASSAPSS;
use x509_parser::signature_algorithm::SignatureAlgorithm;
use x509_parser::x509::AlgorithmIdentifier;

use crate::connector::SessionState;
use crate::error::InspectError;
use crate::naming;
use crate::{Certificate, Inspection, SanEntry, SanType};

/// Builds the inspection result for `session`, measuring expiry against the current time.
pub fn extract(
    session: &SessionState,
    hostname: &str,
    port: u16,
) -> Result<Inspection, InspectError> {
    extract_at(session, hostname, port, Utc::now())
}

/// Builds the inspection result for `session` as of `now`.
///
/// `now` is the single reference instant: every certificate's `expires_in`
/// and the result's `inspected_at` are derived from it.
pub fn extract_at(
    session: &SessionState,
    hostname: &str,
    port: u16,
    now: DateTime<Utc>,
) -> Result<Inspection, InspectError> {
    if session.peer_chain.is_empty() {
        return Err(InspectError::NoCertificatesFound);
    }

    let chain = session
        .peer_chain
        .iter()
        .enumerate()
        .map(|(position, cert)| certificate_record(position, cert, now))
        .collect::<Result<Vec<_>, _>>()?;
    let leaf_expires_at = chain[0].not_after;

    debug!(
        "Extracted {} certificate(s) for {}:{}, leaf expires at {}",
        chain.len(),
        hostname,
        port,
        leaf_expires_at
    );

    Ok(Inspection {
        hostname: hostname.to_string(),
        port,
        remote_addr: session.remote_addr.clone(),
        tls_version: naming::tls_version_label(session.protocol_version),
        cipher_suite: session.cipher_suite.clone(),
        leaf_expires_at,
        inspected_at: now,
        chain,
    })
}

fn certificate_record(
    position: usize,
    cert: &X509Ref,
    now: DateTime<Utc>,
) -> Result<Certificate, InspectError> {
    let serial_number = cert
        .serial_number()
        .to_bn()
        .and_then(|bn| bn.to_dec_str())
        .map(|dec| dec.to_string())
        .map_err(|e| InspectError::certificate(position, "serial_number", e))?;
    let not_before = utc_time(position, "not_before", cert.not_before())?;
    let not_after = utc_time(position, "not_after", cert.not_after())?;
    let public_key_algorithm = match cert.public_key() {
        Ok(key) => naming::public_key_algorithm_name(key.id()),
        Err(e) => {
            warn!("Certificate #{} has an unreadable public key: {}", position, e);
            "unknown".to_string()
        }
    };

    let parsed = parsed_fields(position, cert);
    let signature_algorithm = match parsed.pss_digest {
        Some(digest) => naming::rsa_pss_signature_name(digest),
        None => naming::signature_algorithm_name(cert.signature_algorithm().object()),
    };

    Ok(Certificate {
        subject: naming::distinguished_name(cert.subject_name()),
        issuer: naming::distinguished_name(cert.issuer_name()),
        serial_number,
        version: cert.version() + 1,
        not_before,
        not_after,
        expires_in: not_after.signed_duration_since(now),
        public_key_algorithm,
        signature_algorithm,
        san: subject_alt_names(cert),
        is_ca: parsed.is_ca,
    })
}

fn utc_time(
    position: usize,
    field: &str,
    time: &Asn1TimeRef,
) -> Result<DateTime<Utc>, InspectError> {
    let epoch = Asn1Time::from_unix(0).map_err(|e| InspectError::certificate(position, field, e))?;
    let diff = epoch
        .diff(time)
        .map_err(|e| InspectError::certificate(position, field, e))?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);

    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        InspectError::certificate(position, field, format!("{} is out of range", time))
    })
}

/// SAN values grouped by kind: DNS names, IP addresses, emails, URIs.
fn subject_alt_names(cert: &X509Ref) -> Vec<SanEntry> {
    let names = match cert.subject_alt_names() {
        Some(names) => names,
        None => return Vec::new(),
    };

    let mut entries = Vec::with_capacity(names.len());
    entries.extend(
        names
            .iter()
            .filter_map(|name| name.dnsname())
            .map(|dns| SanEntry::new(SanType::Dns, dns)),
    );
    entries.extend(
        names
            .iter()
            .filter_map(|name| name.ipaddress())
            .map(|ip| SanEntry::new(SanType::Ip, ip_address_text(ip))),
    );
    entries.extend(
        names
            .iter()
            .filter_map(|name| name.email())
            .map(|email| SanEntry::new(SanType::Email, email)),
    );
    entries.extend(
        names
            .iter()
            .filter_map(|name| name.uri())
            .map(|uri| SanEntry::new(SanType::Uri, uri)),
    );
    entries
}

fn ip_address_text(raw: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(raw) {
        return Ipv4Addr::from(octets).to_string();
    }
    if let Ok(octets) = <[u8; 16]>::try_from(raw) {
        return Ipv6Addr::from(octets).to_string();
    }
    let hex: String = raw.iter().map(|b| format!("{:02x}", b)).collect();
    format!("?{}", hex)
}

/// Certificate fields OpenSSL does not expose, read back through x509-parser.
#[derive(Debug, Default)]
struct ParsedFields {
    /// Basic constraints `cA` flag; an absent extension counts as `false`
    is_ca: bool,
    /// Digest named by RSASSA-PSS signature parameters
    pss_digest: Option<Nid>,
}

fn parsed_fields(position: usize, cert: &X509Ref) -> ParsedFields {
    let der = match cert.to_der() {
        Ok(der) => der,
        Err(e) => {
            warn!("Certificate #{} could not be re-encoded: {}", position, e);
            return ParsedFields::default();
        }
    };

    match x509_parser::parse_x509_certificate(&der) {
        Ok((_, parsed)) => ParsedFields {
            is_ca: parsed
                .basic_constraints()
                .ok()
                .flatten()
                .map(|ext| ext.value.ca)
                .unwrap_or(false),
            pss_digest: pss_digest(&parsed.signature_algorithm),
        },
        Err(e) => {
            warn!("Certificate #{} could not be parsed: {}", position, e);
            ParsedFields::default()
        }
    }
}

fn pss_digest(algorithm: &AlgorithmIdentifier) -> Option<Nid> {
    if algorithm.algorithm != OID_PKCS1_RSASSAPSS {
        return None;
    }
    match SignatureAlgorithm::try_from(algorithm) {
        Ok(SignatureAlgorithm::RSASSA_PSS(params)) => {
            Asn1Object::from_str(&params.hash_algorithm_oid().to_id_string())
                .ok()
                .map(|object| object.nid())
        }
        _ => None,
    }
}
