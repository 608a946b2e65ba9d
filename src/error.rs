//! Error types for certificate chain inspection.
//!
//! Every failure aborts the whole inspection; callers branch on the
//! variant instead of matching on message text.

use std::error::Error;
use std::fmt;

/// Boxed underlying cause of a connection failure.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Error type for a failed inspection.
#[derive(Debug)]
pub enum InspectError {
    /// Port outside `1..=65535`, rejected before any network I/O
    InvalidPort {
        /// The rejected port value
        port: i32,
    },

    /// DNS, TCP connect, timeout, TLS handshake or certificate verification failure
    Connection {
        /// The address (host:port) that was being reached
        address: String,
        /// The underlying cause
        source: BoxError,
    },

    /// The handshake succeeded but the peer presented no certificates
    NoCertificatesFound,

    /// A presented certificate carries a field that could not be decoded
    Certificate {
        /// Position in the presented chain, leaf is 0
        position: usize,
        /// Description of what went wrong
        reason: String,
    },
}

impl InspectError {
    pub(crate) fn connection<E>(address: &str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Connection {
            address: address.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn certificate<E: fmt::Display>(position: usize, field: &str, err: E) -> Self {
        Self::Certificate {
            position,
            reason: format!("{}: {}", field, err),
        }
    }
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort { port } => write!(f, "invalid port: {}", port),
            Self::Connection { address, source } => {
                write!(f, "connection to {} failed: {}", address, source)
            }
            Self::NoCertificatesFound => write!(f, "no certificates found"),
            Self::Certificate { position, reason } => {
                write!(f, "certificate #{} in chain: {}", position, reason)
            }
        }
    }
}

impl Error for InspectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
