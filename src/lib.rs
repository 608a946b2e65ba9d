//! TLS certificate chain inspection for remote endpoints.
//!
//! An [`Inspector`] performs a single TLS handshake against `host:port`,
//! reads the certificate chain the peer presented and returns it together
//! with the negotiated protocol version and cipher suite as an
//! [`Inspection`].
//!
//! ```no_run
//! use certinspect::Inspector;
//!
//! let inspection = Inspector::new().inspect("example.com", 443)?;
//! println!("{} expires at {}", inspection.hostname, inspection.leaf_expires_at);
//! # Ok::<(), certinspect::InspectError>(())
//! ```

use chrono::{DateTime, Duration as TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::{Display, EnumString};

mod chain;
pub mod config;
mod connector;
pub mod error;
pub mod naming;

pub use chain::{extract, extract_at};
pub use connector::{connect, validate_port, SessionState};
pub use error::InspectError;

/// Timeout applied to connection establishment and handshake when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Port inspected when none is given.
pub const DEFAULT_PORT: u16 = 443;

/// Kind of a Subject Alternative Name entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SanType {
    Dns,
    Ip,
    Email,
    Uri,
}

/// A single Subject Alternative Name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanEntry {
    #[serde(rename = "type")]
    pub kind: SanType,
    pub value: String,
}

impl SanEntry {
    pub fn new(kind: SanType, value: impl Into<String>) -> Self {
        SanEntry {
            kind,
            value: value.into(),
        }
    }
}

/// One certificate of the presented chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// Entity the certificate was issued to, as an RFC 4514 string
    pub subject: String,
    /// Entity that signed the certificate, as an RFC 4514 string
    pub issuer: String,
    /// Serial number in decimal
    pub serial_number: String,
    /// X.509 version (1, 2 or 3)
    pub version: i32,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Time left until `not_after`, negative once expired.
    /// Serialized as whole seconds.
    #[serde(with = "seconds")]
    pub expires_in: TimeDelta,
    pub public_key_algorithm: String,
    pub signature_algorithm: String,
    /// DNS names, then IP addresses, then email addresses, then URIs
    pub san: Vec<SanEntry>,
    pub is_ca: bool,
}

impl Certificate {
    pub fn is_expired(&self) -> bool {
        self.expires_in < TimeDelta::zero()
    }
}

/// Outcome of inspecting one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    /// Name that was queried, as supplied
    pub hostname: String,
    pub port: u16,
    /// Socket address actually connected to
    pub remote_addr: String,
    pub tls_version: String,
    pub cipher_suite: String,
    /// Copy of the leaf's `not_after`
    pub leaf_expires_at: DateTime<Utc>,
    pub inspected_at: DateTime<Utc>,
    /// Presented chain, leaf first; never empty
    pub chain: Vec<Certificate>,
}

impl Inspection {
    pub fn leaf(&self) -> Option<&Certificate> {
        self.chain.first()
    }

    pub fn is_leaf_expired(&self) -> bool {
        self.leaf().map_or(false, Certificate::is_expired)
    }
}

/// Performs TLS certificate inspections.
///
/// Holds nothing but the timeout, so one value can be shared freely
/// between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspector {
    timeout: Duration,
}

impl Default for Inspector {
    fn default() -> Self {
        Inspector::new()
    }
}

impl Inspector {
    /// Creates an inspector with the 10 second default timeout.
    pub fn new() -> Self {
        Inspector {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Inspector { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Inspects the certificate chain served at `hostname:port`.
    ///
    /// # Errors
    ///
    /// * [`InspectError::InvalidPort`] when `port` is outside `1..=65535`;
    ///   nothing is sent on the network in that case.
    /// * [`InspectError::Connection`] for resolution, connect, timeout,
    ///   handshake and certificate verification failures.
    /// * [`InspectError::NoCertificatesFound`] when the peer sent no certificate.
    /// * [`InspectError::Certificate`] when a presented certificate cannot be read.
    pub fn inspect(&self, hostname: &str, port: i32) -> Result<Inspection, InspectError> {
        let port_number = validate_port(port)?;
        let session = connect(hostname, port, self.timeout)?;
        extract(&session, hostname, port_number)
    }
}

/// Serde adapter storing a signed duration as whole seconds.
mod seconds {
    use chrono::Duration as TimeDelta;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(delta.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        TimeDelta::try_seconds(secs)
            .ok_or_else(|| D::Error::custom(format!("{} seconds is out of range", secs)))
    }
}
