//! peernet Simulation Driver
//!
//! This crate owns the lifecycle of a peernet run: it builds the channel
//! topology, hands each actor its endpoints, runs every actor as its own
//! task and reaps them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ Topology (N×N links, partitioned before start)       │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                        │                            │
//! │  ┌────▼────┐              ┌────▼────┐                       │
//! │  │  Actor  │◄────────────►│  Actor  │     ...               │
//! │  │   #0    │   Credits    │   #1    │                       │
//! │  └─────────┘              └─────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use peernet_sim::{SimWorld, SimConfig};
//!
//! let config = SimConfig {
//!     seed: 42,
//!     num_processes: 6,
//!     max_steps: Some(100),
//!     ..Default::default()
//! };
//!
//! let summary = SimWorld::new(config)?.run().await?;
//! assert!(summary.is_conserved());
//! ```

mod report;
mod world;

pub use report::RunSummary;
pub use world::{SimConfig, SimError, SimWorld};
