//! Tokio-backed link factories.

use crate::{LinkError, LinkFactory};
use tokio::io::DuplexStream;

/// Default per-direction buffer for in-memory links (64 KiB).
pub const DEFAULT_DUPLEX_CAPACITY: usize = 64 * 1024;

/// In-memory links backed by `tokio::io::duplex`.
///
/// Each direction has its own bounded buffer. Dropping one end makes the
/// other end read EOF and fail writes with `BrokenPipe`.
#[derive(Debug, Clone)]
pub struct DuplexLinks {
    /// Buffer size per direction in bytes
    capacity: usize,
}

impl DuplexLinks {
    /// Creates a factory with the given per-direction buffer size.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Returns the per-direction buffer size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DuplexLinks {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLEX_CAPACITY)
    }
}

impl LinkFactory for DuplexLinks {
    type Endpoint = DuplexStream;

    fn pair(&self) -> Result<(DuplexStream, DuplexStream), LinkError> {
        Ok(tokio::io::duplex(self.capacity))
    }

    fn name(&self) -> &'static str {
        "duplex"
    }
}

/// Local links backed by connected unix stream socket pairs.
///
/// Endpoints register with the tokio reactor, so `pair()` must be called
/// from inside a runtime.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixLinks;

#[cfg(unix)]
impl LinkFactory for UnixLinks {
    type Endpoint = tokio::net::UnixStream;

    fn pair(&self) -> Result<(Self::Endpoint, Self::Endpoint), LinkError> {
        Ok(tokio::net::UnixStream::pair()?)
    }

    fn name(&self) -> &'static str {
        "unix"
    }
}
