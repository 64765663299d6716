use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Address of a seqlink peer or listener.
///
/// Rendered and parsed as `unix:PATH` or `tcp:HOST:PORT`. A bare string
/// containing a path separator is treated as a Unix socket path for
/// convenience on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
    /// TCP host:port address.
    Tcp(String),
}

impl Endpoint {
    /// Create a Unix socket endpoint.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }

    /// Create a TCP endpoint from a `host:port` string.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Endpoint::Tcp(addr.into())
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Unix(_) => "unix-domain-socket",
            Endpoint::Tcp(_) => "tcp",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidEndpoint(input.to_string()));
        }

        if let Some(path) = input.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        if let Some(addr) = input.strip_prefix("tcp:") {
            return parse_tcp(input, addr);
        }

        // Bare paths are common in scripts; anything with a separator is a
        // socket path, anything with a single colon is host:port.
        if input.contains('/') {
            return Ok(Endpoint::Unix(PathBuf::from(input)));
        }
        if input.contains(':') {
            return parse_tcp(input, input);
        }

        Err(TransportError::InvalidEndpoint(input.to_string()))
    }
}

fn parse_tcp(original: &str, addr: &str) -> Result<Endpoint, TransportError> {
    let port_ok = addr
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !port_ok {
        return Err(TransportError::InvalidEndpoint(original.to_string()));
    }
    Ok(Endpoint::Tcp(addr.to_string()))
}
