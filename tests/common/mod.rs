//! Certificates and loopback TLS servers for integration tests.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{HandshakeError, SslAcceptor, SslMethod, SslVersion};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509NameBuilder, X509Ref, X509};
use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DAY: i64 = 86_400;

/// Root, intermediate and leaf issued for `127.0.0.1` / `localhost`.
pub struct Pki {
    pub root: X509,
    pub intermediate: X509,
    pub leaf: X509,
    pub leaf_key: PKey<Private>,
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

/// Issues a certificate for `common_name`, self-signed when `issuer` is `None`.
pub fn issue(
    common_name: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509Ref, &PKey<Private>)>,
    serial: u32,
    ca: bool,
    lifetime_days: i64,
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COUNTRYNAME, "US").unwrap();
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Certinspect Test").unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((cert, _)) => builder.set_issuer_name(cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }

    let now = unix_now();
    builder
        .set_not_before(&Asn1Time::from_unix(now - DAY).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(now + lifetime_days * DAY).unwrap())
        .unwrap();
    builder.set_pubkey(key).unwrap();

    let issuer_cert = issuer.map(|(cert, _)| cert);
    let skid = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(issuer_cert, None))
        .unwrap();
    builder.append_extension(skid).unwrap();

    if issuer_cert.is_some() {
        let akid = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(issuer_cert, None))
            .unwrap();
        builder.append_extension(akid).unwrap();
    }

    if ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    } else {
        builder
            .append_extension(BasicConstraints::new().build().unwrap())
            .unwrap();
        builder
            .append_extension(KeyUsage::new().digital_signature().build().unwrap())
            .unwrap();
        builder
            .append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
            .unwrap();
        let san = SubjectAlternativeName::new()
            .dns("localhost")
            .ip("127.0.0.1")
            .build(&builder.x509v3_context(issuer_cert, None))
            .unwrap();
        builder.append_extension(san).unwrap();
    }

    let signing_key = issuer.map(|(_, key)| key).unwrap_or(key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

pub fn pki() -> Pki {
    let root_key = ec_key();
    let root = issue("Certinspect Test Root", &root_key, None, 1, true, 3650);

    let intermediate_key = ec_key();
    let intermediate = issue(
        "Certinspect Test Intermediate",
        &intermediate_key,
        Some((&root, &root_key)),
        2,
        true,
        1825,
    );

    let leaf_key = ec_key();
    let leaf = issue(
        "localhost",
        &leaf_key,
        Some((&intermediate, &intermediate_key)),
        3,
        false,
        90,
    );

    Pki {
        root,
        intermediate,
        leaf,
        leaf_key,
    }
}

/// TLS 1.3 only acceptor presenting `leaf` followed by `extra_chain`.
pub fn acceptor(leaf: &X509, key: &PKey<Private>, extra_chain: &[&X509]) -> SslAcceptor {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    builder.set_private_key(key).unwrap();
    builder.set_certificate(leaf).unwrap();
    for cert in extra_chain {
        builder.add_extra_chain_cert((*cert).clone()).unwrap();
    }
    builder
        .set_min_proto_version(Some(SslVersion::TLS1_3))
        .unwrap();
    builder.set_ciphersuites("TLS_AES_128_GCM_SHA256").unwrap();
    builder.build()
}

/// Serves a single TLS connection on a loopback port.
///
/// The handle yields whether the client closed the connection: a
/// `close_notify` or EOF after a completed handshake, EOF or reset after a
/// failed one. A client that leaves the socket open yields `false` once the
/// 5 second read timeout fires.
pub fn serve_once(acceptor: SslAcceptor) -> (u16, JoinHandle<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = match listener.accept() {
            Ok(conn) => conn,
            Err(_) => return false,
        };
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        match acceptor.accept(stream) {
            Ok(mut tls) => {
                let mut buf = [0u8; 16];
                let closed = match tls.read(&mut buf) {
                    Ok(n) => n == 0,
                    Err(e) => !is_timeout(&e),
                };
                let _ = tls.shutdown();
                closed
            }
            Err(HandshakeError::Failure(mut mid)) => drained_to_eof(mid.get_mut()),
            Err(_) => false,
        }
    });

    (port, handle)
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn drained_to_eof(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 512];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => return true,
            Err(_) => return false,
        }
    }
}
