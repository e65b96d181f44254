//! Domain registration checks run before a domain or mailbox is created.
//!
//! # Design
//! The client only asks "is this domain registered?" through the
//! `RegistrationChecker` trait, so the lookup can be swapped per
//! deployment or replaced in tests. `WhoisChecker` is the default: a plain
//! RFC 3912 query whose reply is searched for a marker text that the
//! registry only prints for existing records. The default server and
//! marker match Verisign (.com/.net); other registries need their own.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::WhoisError;

pub const DEFAULT_WHOIS_SERVER: &str = "whois.verisign-grs.com:43";

/// Disclaimer Verisign appends to every record it finds.
pub const DEFAULT_REGISTERED_MARKER: &str = "NOTICE: The expiration date displayed in this record";

pub const DEFAULT_WHOIS_TIMEOUT: Duration = Duration::from_secs(10);

/// Replies longer than this are truncated. Real records are a few KiB.
pub const MAX_WHOIS_REPLY: usize = 64 * 1024;

/// Answers whether a domain is registered.
///
/// The client treats `Ok(false)` and `Err(_)` the same way: creation is
/// refused.
pub trait RegistrationChecker: Send + Sync {
    fn is_registered(&self, domain: &str) -> Result<bool, WhoisError>;
}

impl<F> RegistrationChecker for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_registered(&self, domain: &str) -> Result<bool, WhoisError> {
        Ok(self(domain))
    }
}

/// Accepts every domain, disabling the gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RegistrationChecker for AcceptAll {
    fn is_registered(&self, _domain: &str) -> Result<bool, WhoisError> {
        Ok(true)
    }
}

/// WHOIS lookup over TCP port 43.
#[derive(Debug, Clone)]
pub struct WhoisChecker {
    server: String,
    marker: String,
    timeout: Duration,
}

impl WhoisChecker {
    /// Query `server` (`host:port`) with the default marker and timeout.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            marker: DEFAULT_REGISTERED_MARKER.to_string(),
            timeout: DEFAULT_WHOIS_TIMEOUT,
        }
    }

    /// Text whose presence in the reply proves registration.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Raw WHOIS reply for `domain`, decoded lossily as UTF-8.
    ///
    /// The whole lookup (connect, query and reply) must finish within the
    /// configured timeout. Replies are cut off after `MAX_WHOIS_REPLY` bytes.
    pub fn query(&self, domain: &str) -> Result<String, WhoisError> {
        let deadline = Instant::now() + self.timeout;
        let io_err = |source: io::Error| WhoisError::Io {
            server: self.server.clone(),
            source,
        };

        let mut stream = self.connect(deadline)?;
        stream
            .set_write_timeout(Some(remaining(deadline).map_err(io_err)?))
            .map_err(io_err)?;
        stream
            .write_all(format!("{domain}\r\n").as_bytes())
            .map_err(io_err)?;

        let mut reply = Vec::new();
        let mut chunk = [0u8; 4096];
        while reply.len() < MAX_WHOIS_REPLY {
            stream
                .set_read_timeout(Some(remaining(deadline).map_err(io_err)?))
                .map_err(io_err)?;
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => reply.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                // Unix reports an expired read timeout as WouldBlock.
                Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Err(io_err(timed_out()));
                }
                Err(err) => return Err(io_err(err)),
            }
        }
        reply.truncate(MAX_WHOIS_REPLY);
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    fn connect(&self, deadline: Instant) -> Result<TcpStream, WhoisError> {
        let connect_err = |source: io::Error| WhoisError::Connect {
            server: self.server.clone(),
            source,
        };

        let mut last = io::Error::new(io::ErrorKind::NotFound, "server name did not resolve");
        for addr in self.server.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&addr, remaining(deadline).map_err(connect_err)?) {
                Ok(stream) => return Ok(stream),
                Err(err) => last = err,
            }
        }
        Err(connect_err(last))
    }
}

/// Time left before `deadline`, or `TimedOut` once it has passed.
fn remaining(deadline: Instant) -> io::Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(timed_out());
    }
    Ok(left)
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "whois lookup timed out")
}

impl Default for WhoisChecker {
    fn default() -> Self {
        Self::new(DEFAULT_WHOIS_SERVER)
    }
}

impl RegistrationChecker for WhoisChecker {
    fn is_registered(&self, domain: &str) -> Result<bool, WhoisError> {
        let reply = self.query(domain)?;
        let registered = reply.contains(&self.marker);
        debug!(domain, server = %self.server, registered, "whois lookup finished");
        Ok(registered)
    }
}
