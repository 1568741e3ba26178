//! peernet Environment Abstraction Layer
//!
//! This crate provides the transport abstraction that lets the peernet
//! actor runtime run over different kinds of point-to-point byte channels:
//!
//! - **In-memory** (`DuplexLinks`): `tokio::io::duplex` pipes, portable and
//!   fully contained in the process.
//! - **Local sockets** (`UnixLinks`): connected `UnixStream` pairs, one kernel
//!   socket pair per link (unix only).
//!
//! Every link is a pair of endpoints. The actor runtime never cares which
//! implementation produced them; it only needs `AsyncRead + AsyncWrite`.
//!
//! # Example
//!
//! ```ignore
//! use peernet_env::{DuplexLinks, LinkFactory};
//!
//! let links = DuplexLinks::default();
//! let (forward, reverse) = links.pair()?;
//! ```

mod error;
mod link;
mod tokio_impl;
mod types;

pub use error::LinkError;
pub use link::{LinkFactory, TransportKind};
pub use tokio_impl::DuplexLinks;
#[cfg(unix)]
pub use tokio_impl::UnixLinks;
pub use types::ActorId;
