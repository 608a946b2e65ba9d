//! Human-readable names for negotiated parameters and certificate fields.
//!
//! Everything here is a pure lookup: protocol version codes, cipher suite
//! identifiers, algorithm NIDs and distinguished names go in, display
//! strings come out.

use openssl::asn1::Asn1ObjectRef;
use openssl::nid::Nid;
use openssl::pkey::Id;
use openssl::ssl::SslVersion;
use openssl::x509::{X509NameEntryRef, X509NameRef};
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Name;

/// Wire code of TLS 1.0.
pub const TLS1_0: u16 = 0x0301;
/// Wire code of TLS 1.1.
pub const TLS1_1: u16 = 0x0302;
/// Wire code of TLS 1.2.
pub const TLS1_2: u16 = 0x0303;
/// Wire code of TLS 1.3.
pub const TLS1_3: u16 = 0x0304;

const SSL3_0: u16 = 0x0300;

/// Returns the short label for a TLS protocol version code.
///
/// Known versions map to `"1.0"` through `"1.3"`; any other code maps to
/// `"unknown TLS version: 0x%04x"` with the code zero-padded to four hex
/// digits.
///
/// ```
/// use certinspect::naming::tls_version_label;
///
/// assert_eq!(tls_version_label(0x0304), "1.3");
/// assert_eq!(tls_version_label(0x0300), "unknown TLS version: 0x0300");
/// ```
pub fn tls_version_label(code: u16) -> String {
    match code {
        TLS1_0 => "1.0".to_string(),
        TLS1_1 => "1.1".to_string(),
        TLS1_2 => "1.2".to_string(),
        TLS1_3 => "1.3".to_string(),
        other => format!("unknown TLS version: 0x{:04x}", other),
    }
}

/// Maps the version OpenSSL negotiated back to its wire code.
///
/// OpenSSL does not expose the raw value, so versions outside the SSL3 to
/// TLS 1.3 range come back as `0`.
pub(crate) fn protocol_code(version: Option<SslVersion>) -> u16 {
    match version {
        Some(SslVersion::TLS1_3) => TLS1_3,
        Some(SslVersion::TLS1_2) => TLS1_2,
        Some(SslVersion::TLS1_1) => TLS1_1,
        Some(SslVersion::TLS1) => TLS1_0,
        Some(SslVersion::SSL3) => SSL3_0,
        _ => 0,
    }
}

/// Returns the canonical name of a cipher suite.
///
/// `standard` is the RFC name reported by the TLS library; when it has
/// none, the IANA identifier is rendered as `0xXXXX`.
pub fn cipher_suite_name(id: u16, standard: Option<&str>) -> String {
    match standard {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("0x{:04X}", id),
    }
}

/// Lower-case name of a public key algorithm.
pub fn public_key_algorithm_name(id: Id) -> String {
    let name = match id {
        Id::RSA => "rsa",
        Id::DSA => "dsa",
        Id::EC => "ecdsa",
        Id::ED25519 => "ed25519",
        Id::ED448 => "ed448",
        other => {
            return Nid::from_raw(other.as_raw())
                .long_name()
                .map(str::to_lowercase)
                .unwrap_or_else(|_| format!("unknown ({})", other.as_raw()));
        }
    };
    name.to_string()
}

fn signature_nid_name(nid: Nid) -> Option<&'static str> {
    let name = match nid {
        Nid::MD5WITHRSAENCRYPTION => "md5-rsa",
        Nid::SHA1WITHRSAENCRYPTION => "sha1-rsa",
        Nid::SHA256WITHRSAENCRYPTION => "sha256-rsa",
        Nid::SHA384WITHRSAENCRYPTION => "sha384-rsa",
        Nid::SHA512WITHRSAENCRYPTION => "sha512-rsa",
        Nid::RSASSAPSS => "rsassa-pss",
        Nid::DSAWITHSHA1 => "dsa-sha1",
        Nid::DSA_WITH_SHA256 => "dsa-sha256",
        Nid::ECDSA_WITH_SHA1 => "ecdsa-sha1",
        Nid::ECDSA_WITH_SHA256 => "ecdsa-sha256",
        Nid::ECDSA_WITH_SHA384 => "ecdsa-sha384",
        Nid::ECDSA_WITH_SHA512 => "ecdsa-sha512",
        _ => return None,
    };
    Some(name)
}

/// Lower-case name of a signature algorithm.
///
/// Unlisted algorithms fall back to OpenSSL's textual form of the object
/// (long name, or dotted OID when unknown), lower-cased. RSASSA-PSS is only
/// named `rsassa-pss` here; see [`rsa_pss_signature_name`] for the form that
/// includes the digest.
pub fn signature_algorithm_name(object: &Asn1ObjectRef) -> String {
    match signature_nid_name(object.nid()) {
        Some(name) => name.to_string(),
        None => object.to_string().to_lowercase(),
    }
}

/// Name of an RSASSA-PSS signature whose parameters select `digest`,
/// e.g. `sha256-rsapss`.
pub fn rsa_pss_signature_name(digest: Nid) -> String {
    match digest.short_name() {
        Ok(short) if digest != Nid::UNDEF => format!("{}-rsapss", short.to_lowercase()),
        _ => "rsassa-pss".to_string(),
    }
}

/// Renders an X.509 name as an RFC 4514 string, most specific RDN first.
///
/// Attributes sharing one RDN are joined with `+`.
pub fn distinguished_name(name: &X509NameRef) -> String {
    let attributes: Vec<String> = name.entries().map(attribute_text).collect();

    let mut rdns = Vec::new();
    let mut rest = attributes.as_slice();
    for size in rdn_sizes(name, attributes.len()) {
        let (rdn, tail) = rest.split_at(size);
        rdns.push(rdn.join("+"));
        rest = tail;
    }
    rdns.reverse();
    rdns.join(",")
}

fn attribute_text(entry: &X509NameEntryRef) -> String {
    let object = entry.object();
    let key = match object.nid().short_name() {
        Ok(short) if object.nid() != Nid::UNDEF => short.to_string(),
        _ => object.to_string(),
    };
    let value = match entry.data().to_string() {
        Ok(text) => escape_attribute_value(&text),
        Err(_) => hex_attribute_value(entry.data().as_slice()),
    };
    format!("{}={}", key, value)
}

/// Attribute count of each RDN in encoding order.
///
/// OpenSSL's entry iterator flattens the RDN sets, so the grouping is read
/// back from the DER. Falls back to one attribute per RDN when the name
/// cannot be re-read.
fn rdn_sizes(name: &X509NameRef, attributes: usize) -> Vec<usize> {
    let sizes = name.to_der().ok().and_then(|der| {
        X509Name::from_der(&der)
            .ok()
            .map(|(_, parsed)| parsed.iter().map(|rdn| rdn.iter().count()).collect::<Vec<_>>())
    });
    match sizes {
        Some(sizes) if sizes.iter().sum::<usize>() == attributes => sizes,
        _ => vec![1; attributes],
    }
}

fn escape_attribute_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn hex_attribute_value(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("#{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::asn1::Asn1Object;
    use openssl::x509::{X509Name as OpensslName, X509NameBuilder};

    #[test]
    fn test_known_tls_versions() {
        assert_eq!(tls_version_label(TLS1_0), "1.0");
        assert_eq!(tls_version_label(TLS1_1), "1.1");
        assert_eq!(tls_version_label(TLS1_2), "1.2");
        assert_eq!(tls_version_label(TLS1_3), "1.3");
    }

    #[test]
    fn test_tls_version_fallback_is_total() {
        for code in 0..=u16::MAX {
            let label = tls_version_label(code);
            if (TLS1_0..=TLS1_3).contains(&code) {
                assert!(!label.starts_with("unknown"), "code {:#06x}", code);
            } else {
                assert_eq!(label, format!("unknown TLS version: 0x{:04x}", code));
            }
        }
        assert_eq!(tls_version_label(0x7f1c), "unknown TLS version: 0x7f1c");
        assert_eq!(tls_version_label(0x0002), "unknown TLS version: 0x0002");
    }

    #[test]
    fn test_protocol_code_from_openssl() {
        assert_eq!(protocol_code(Some(SslVersion::TLS1_3)), TLS1_3);
        assert_eq!(protocol_code(Some(SslVersion::TLS1_2)), TLS1_2);
        assert_eq!(protocol_code(Some(SslVersion::TLS1)), TLS1_0);
        assert_eq!(protocol_code(Some(SslVersion::SSL3)), 0x0300);
        assert_eq!(protocol_code(None), 0);
    }

    #[test]
    fn test_cipher_suite_name() {
        assert_eq!(
            cipher_suite_name(0x1301, Some("TLS_AES_128_GCM_SHA256")),
            "TLS_AES_128_GCM_SHA256"
        );
        assert_eq!(cipher_suite_name(0xc02f, None), "0xC02F");
        assert_eq!(cipher_suite_name(0x00ff, Some("")), "0x00FF");
    }

    #[test]
    fn test_public_key_algorithm_names_are_lower_case() {
        assert_eq!(public_key_algorithm_name(Id::RSA), "rsa");
        assert_eq!(public_key_algorithm_name(Id::EC), "ecdsa");
        assert_eq!(public_key_algorithm_name(Id::ED25519), "ed25519");

        let fallback = public_key_algorithm_name(Id::X25519);
        assert_eq!(fallback, fallback.to_lowercase());
    }

    #[test]
    fn test_signature_algorithm_names() {
        let sha256_rsa = Asn1Object::from_str("1.2.840.113549.1.1.11").unwrap();
        assert_eq!(signature_algorithm_name(&sha256_rsa), "sha256-rsa");

        let ecdsa = Asn1Object::from_str("1.2.840.10045.4.3.3").unwrap();
        assert_eq!(signature_algorithm_name(&ecdsa), "ecdsa-sha384");

        // sha224WithRSAEncryption is not in the table
        let unlisted = Asn1Object::from_str("1.2.840.113549.1.1.14").unwrap();
        let name = signature_algorithm_name(&unlisted);
        assert_eq!(name, "sha224withrsaencryption");

        let ed25519 = Asn1Object::from_str("1.3.101.112").unwrap();
        assert_eq!(signature_algorithm_name(&ed25519), "ed25519");
        let ed448 = Asn1Object::from_str("1.3.101.113").unwrap();
        assert_eq!(signature_algorithm_name(&ed448), "ed448");
    }

    #[test]
    fn test_rsa_pss_signature_name() {
        assert_eq!(rsa_pss_signature_name(Nid::SHA256), "sha256-rsapss");
        assert_eq!(rsa_pss_signature_name(Nid::SHA384), "sha384-rsapss");
        assert_eq!(rsa_pss_signature_name(Nid::SHA512), "sha512-rsapss");
        assert_eq!(rsa_pss_signature_name(Nid::UNDEF), "rsassa-pss");
    }

    #[test]
    fn test_multi_valued_rdn_is_joined_with_plus() {
        // C=US, then a single RDN holding CN=a and O=b
        let der = [
            0x30, 0x23, 0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x06, 0x13, 0x02, 0x55,
            0x53, 0x31, 0x14, 0x30, 0x08, 0x06, 0x03, 0x55, 0x04, 0x03, 0x0c, 0x01, 0x61, 0x30,
            0x08, 0x06, 0x03, 0x55, 0x04, 0x0a, 0x0c, 0x01, 0x62,
        ];
        let name = OpensslName::from_der(&der).unwrap();

        assert_eq!(distinguished_name(&name), "CN=a+O=b,C=US");
    }

    #[test]
    fn test_interior_nul_is_kept_and_escaped() {
        let mut builder = X509NameBuilder::new().unwrap();
        builder.append_entry_by_nid(Nid::COMMONNAME, "a\0b").unwrap();

        assert_eq!(distinguished_name(&builder.build()), "CN=a\\00b");
    }

    #[test]
    fn test_distinguished_name_reverses_rdns() {
        let mut builder = X509NameBuilder::new().unwrap();
        builder.append_entry_by_nid(Nid::COUNTRYNAME, "US").unwrap();
        builder
            .append_entry_by_nid(Nid::ORGANIZATIONNAME, "Example, Inc.")
            .unwrap();
        builder
            .append_entry_by_nid(Nid::COMMONNAME, "www.example.com")
            .unwrap();
        let name = builder.build();

        assert_eq!(
            distinguished_name(&name),
            "CN=www.example.com,O=Example\\, Inc.,C=US"
        );
    }

    #[test]
    fn test_escape_attribute_value() {
        assert_eq!(escape_attribute_value("plain"), "plain");
        assert_eq!(escape_attribute_value("#hash"), "\\#hash");
        assert_eq!(escape_attribute_value(" padded "), "\\ padded\\ ");
        assert_eq!(escape_attribute_value("a+b;c"), "a\\+b\\;c");
        assert_eq!(escape_attribute_value(""), "");
    }
}
