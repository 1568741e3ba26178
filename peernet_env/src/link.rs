//! Link abstraction for point-to-point channels between actors.

use crate::error::LinkError;
use tokio::io::{AsyncRead, AsyncWrite};

/// Factory for bidirectional point-to-point links.
///
/// # Implementations
///
/// - **In-memory**: `tokio::io::duplex` pipes
/// - **Local sockets**: `UnixStream::pair()`
///
/// # Link Layout
///
/// ```text
/// Actor i                    Link (i, j)                  Actor j
///   |                            |                            |
///   |-- write(forward) --------->|                            |
///   |                            |-------> read(reverse) ---->|
/// ```
///
/// Both endpoints are stream-oriented and preserve byte order, so frames
/// written on one link arrive in the order they were sent.
pub trait LinkFactory: Send + Sync + 'static {
    /// One end of a link.
    type Endpoint: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Creates a connected pair of endpoints.
    ///
    /// # Returns
    /// * `Ok((forward, reverse))` - bytes written to one end are readable on the other
    /// * `Err(LinkError)` - the link could not be created
    fn pair(&self) -> Result<(Self::Endpoint, Self::Endpoint), LinkError>;

    /// Short transport name (for logging).
    fn name(&self) -> &'static str;
}

/// Selects which `LinkFactory` the driver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// In-memory duplex pipes
    #[default]
    Duplex,

    /// Local unix socket pairs
    Unix,
}

impl TransportKind {
    /// Returns the transport name.
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Duplex => "duplex",
            TransportKind::Unix => "unix",
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duplex" | "memory" => Ok(TransportKind::Duplex),
            "unix" | "socketpair" => Ok(TransportKind::Unix),
            _ => Err(format!("Unknown transport: {}", s)),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
