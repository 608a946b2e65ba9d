//! TCP connection and TLS handshake.

use log::{debug, warn};
use openssl::error::ErrorStack;
use openssl::ssl::{HandshakeError, SslConnector, SslFiletype, SslMethod, SslStream};
use openssl::x509::store::X509Lookup;
use openssl::x509::{X509VerifyResult, X509};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::InspectError;
use crate::naming;

/// Upper bound on the connection deadline, used when the caller's timeout overflows `Instant`.
const MAX_DEADLINE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// What a completed handshake negotiated.
///
/// The certificates are owned copies, so the connection they came from is
/// already closed by the time a `SessionState` is handed out.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Negotiated protocol version as its wire code, e.g. `0x0304`
    pub protocol_version: u16,
    /// Canonical name of the negotiated cipher suite
    pub cipher_suite: String,
    /// Certificates exactly as the peer presented them, leaf first
    pub peer_chain: Vec<X509>,
    /// Socket address the connection was made to
    pub remote_addr: String,
}

/// Checks that `port` is a usable TCP port.
pub fn validate_port(port: i32) -> Result<u16, InspectError> {
    match u16::try_from(port) {
        Ok(valid) if valid != 0 => Ok(valid),
        _ => Err(InspectError::InvalidPort { port }),
    }
}

/// Connects to `hostname:port` and performs a verified TLS handshake.
///
/// `timeout` bounds name resolution, TCP connection establishment and the
/// handshake together. Certificate and hostname verification use the
/// platform trust store and cannot be turned off.
pub fn connect(hostname: &str, port: i32, timeout: Duration) -> Result<SessionState, InspectError> {
    let port = validate_port(port)?;
    let address = join_host_port(hostname, port);

    if hostname.is_empty() {
        return Err(InspectError::connection(
            &address,
            io::Error::new(io::ErrorKind::InvalidInput, "empty hostname"),
        ));
    }

    let now = Instant::now();
    let deadline = now
        .checked_add(timeout)
        .unwrap_or_else(|| now + MAX_DEADLINE);

    let tcp = open_tcp(hostname, port, &address, deadline)?;
    let remote_addr = tcp
        .peer_addr()
        .map(|addr| addr.to_string())
        .map_err(|e| InspectError::connection(&address, e))?;

    let stream = DeadlineStream {
        inner: tcp,
        deadline,
    };
    let session = handshake(hostname, &address, stream)?;
    let ssl = session.stream.ssl();

    let protocol_version = naming::protocol_code(ssl.version2());
    let cipher_suite = match ssl.current_cipher() {
        Some(cipher) => {
            naming::cipher_suite_name(u16::from_be_bytes(cipher.protocol_id()), cipher.standard_name())
        }
        None => naming::cipher_suite_name(0, None),
    };
    let peer_chain: Vec<X509> = ssl
        .peer_cert_chain()
        .map(|chain| chain.iter().map(|cert| cert.to_owned()).collect())
        .unwrap_or_default();

    debug!(
        "Handshake with {} ({}) done: {}, {}, {} certificate(s)",
        address,
        remote_addr,
        ssl.version_str(),
        cipher_suite,
        peer_chain.len()
    );

    Ok(SessionState {
        protocol_version,
        cipher_suite,
        peer_chain,
        remote_addr,
    })
}

/// Established TLS stream that is shut down and closed when dropped.
struct TlsSession {
    stream: SslStream<DeadlineStream>,
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        if let Err(e) = self.stream.shutdown() {
            debug!("close_notify not delivered: {}", e);
        }
    }
}

/// TCP stream whose reads and writes all share one deadline.
///
/// Each call gets the time left as its socket timeout, so a peer that
/// trickles bytes cannot stretch the handshake past the deadline.
#[derive(Debug)]
struct DeadlineStream {
    inner: TcpStream,
    deadline: Instant,
}

impl DeadlineStream {
    fn budget(&self) -> io::Result<Duration> {
        remaining(self.deadline).ok_or_else(timed_out_io)
    }
}

/// A socket timeout surfaces as `WouldBlock` on Unix, which OpenSSL would
/// treat as a retry. Report it as a hard timeout instead.
fn expired(err: io::Error) -> io::Error {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => timed_out_io(),
        _ => err,
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let budget = self.budget()?;
        self.inner.set_read_timeout(Some(budget))?;
        self.inner.read(buf).map_err(expired)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let budget = self.budget()?;
        self.inner.set_write_timeout(Some(budget))?;
        self.inner.write(buf).map_err(expired)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn join_host_port(hostname: &str, port: u16) -> String {
    if hostname.contains(':') {
        format!("[{}]:{}", hostname, port)
    } else {
        format!("{}:{}", hostname, port)
    }
}

fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}

fn timed_out_io() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "connection timed out")
}

fn timed_out(address: &str) -> InspectError {
    InspectError::connection(address, timed_out_io())
}

/// Resolves on a helper thread so the lookup counts against `deadline`.
///
/// The system resolver cannot be cancelled; a lookup that outlives the
/// deadline finishes in the background and its result is dropped.
fn resolve(
    hostname: &str,
    port: u16,
    address: &str,
    deadline: Instant,
) -> Result<Vec<SocketAddr>, InspectError> {
    let (sender, receiver) = mpsc::channel();
    let host = hostname.to_string();
    thread::Builder::new()
        .name("certi-resolve".to_string())
        .spawn(move || {
            let result = (host.as_str(), port)
                .to_socket_addrs()
                .map(|addrs| addrs.collect::<Vec<_>>());
            // The receiver is gone when the caller already timed out
            let _ = sender.send(result);
        })
        .map_err(|e| InspectError::connection(address, e))?;

    let budget = remaining(deadline).ok_or_else(|| timed_out(address))?;
    match receiver.recv_timeout(budget) {
        Ok(result) => result.map_err(|e| InspectError::connection(address, e)),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(timed_out(address)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(InspectError::connection(
            address,
            io::Error::new(io::ErrorKind::Other, "resolver thread exited"),
        )),
    }
}

fn open_tcp(
    hostname: &str,
    port: u16,
    address: &str,
    deadline: Instant,
) -> Result<TcpStream, InspectError> {
    debug!("Resolving {}", address);
    let candidates = resolve(hostname, port, address, deadline)?;

    let mut last_error = io::Error::new(
        io::ErrorKind::NotFound,
        "hostname did not resolve to any address",
    );
    for candidate in candidates {
        let budget = match remaining(deadline) {
            Some(budget) => budget,
            None => return Err(timed_out(address)),
        };
        debug!("Connecting to {} via {}", address, candidate);
        match TcpStream::connect_timeout(&candidate, budget) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                warn!("Connection to {} via {} failed: {}", address, candidate, e);
                last_error = e;
            }
        }
    }

    Err(InspectError::connection(address, last_error))
}

/// Client connector trusting the platform's CA certificates.
///
/// OpenSSL's compiled-in default paths point at its own install prefix,
/// which holds no certificates for a vendored build, so the bundle file and
/// hashed directories are located with `openssl-probe`. `SSL_CERT_FILE` and
/// `SSL_CERT_DIR` still take precedence.
fn tls_connector() -> Result<SslConnector, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;
    let platform = openssl_probe::probe();

    if let Some(file) = &platform.cert_file {
        debug!("Loading trusted certificates from {}", file.display());
        if let Err(e) = builder.set_ca_file(file) {
            warn!("Could not load {}: {}", file.display(), e);
        }
    }
    if !platform.cert_dir.is_empty() {
        let lookup = builder.cert_store_mut().add_lookup(X509Lookup::hash_dir())?;
        for dir in &platform.cert_dir {
            if let Some(dir) = dir.to_str() {
                debug!("Looking up trusted certificates in {}", dir);
                lookup.add_dir(dir, SslFiletype::PEM)?;
            }
        }
    }

    Ok(builder.build())
}

fn handshake(
    hostname: &str,
    address: &str,
    stream: DeadlineStream,
) -> Result<TlsSession, InspectError> {
    let connector = tls_connector().map_err(|e| InspectError::connection(address, e))?;

    match connector.connect(hostname, stream) {
        Ok(stream) => Ok(TlsSession { stream }),
        Err(HandshakeError::SetupFailure(stack)) => Err(InspectError::connection(address, stack)),
        Err(HandshakeError::Failure(mid)) | Err(HandshakeError::WouldBlock(mid)) => {
            let verify = mid.ssl().verify_result();
            let error = mid.into_error();
            let deadline_hit = error
                .io_error()
                .map_or(false, |io| io.kind() == io::ErrorKind::TimedOut);

            if deadline_hit {
                Err(timed_out(address))
            } else if verify == X509VerifyResult::OK {
                Err(InspectError::connection(address, error))
            } else {
                Err(InspectError::connection(
                    address,
                    format!("{}: {}", error, verify.error_string()),
                ))
            }
        }
    }
}
