//! Channel topology: one directed link per ordered pair of actors.
//!
//! Cell `(i, j)` of the N×N matrix is the channel from actor `i` to actor
//! `j`. Its forward endpoint is written by `i`, its reverse endpoint is read
//! by `j`. Diagonal cells are allocated like every other cell so indexing
//! stays uniform, and are released during partitioning.
//!
//! ```text
//!            to 0        to 1        to 2
//! from 0  [ unused ]  [ 0 -> 1 ]  [ 0 -> 2 ]
//! from 1  [ 1 -> 0 ]  [ unused ]  [ 1 -> 2 ]
//! from 2  [ 2 -> 0 ]  [ 2 -> 1 ]  [ unused ]
//! ```
//!
//! Actor `k` ends up owning the forward ends of row `k` and the reverse
//! ends of column `k`, and nothing else.

use peernet_env::{ActorId, LinkError, LinkFactory};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised while building the topology. All of them are fatal.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A network needs at least two actors
    #[error("Need at least 2 processes, got {0}")]
    TooFewProcesses(usize),

    /// A cell's link could not be created
    #[error("Failed to create channel {from} -> {to}: {source}")]
    Link {
        from: ActorId,
        to: ActorId,
        #[source]
        source: LinkError,
    },
}

/// One cell of the matrix.
pub struct Channel<E> {
    /// Written by the source actor
    pub forward: E,

    /// Read by the destination actor
    pub reverse: E,
}

/// The complete N×N channel matrix.
///
/// Built once before any actor starts and only ever consumed by
/// `into_endpoints`.
pub struct Topology<E> {
    num_processes: usize,
    cells: Vec<Vec<Channel<E>>>,
}

impl<E> Topology<E> {
    /// Builds the full matrix, including the unused diagonal.
    ///
    /// Any link failure aborts construction; no partial topology is returned.
    pub fn build<L>(num_processes: usize, links: &L) -> Result<Self, TopologyError>
    where
        L: LinkFactory<Endpoint = E>,
    {
        if num_processes < 2 {
            return Err(TopologyError::TooFewProcesses(num_processes));
        }

        let mut cells = Vec::with_capacity(num_processes);
        for from in ActorId::all(num_processes) {
            let mut row = Vec::with_capacity(num_processes);
            for to in ActorId::all(num_processes) {
                let (forward, reverse) = links
                    .pair()
                    .map_err(|source| TopologyError::Link { from, to, source })?;
                row.push(Channel { forward, reverse });
            }
            cells.push(row);
        }

        debug!(
            "Built {}x{} topology over {} links",
            num_processes,
            num_processes,
            links.name()
        );

        Ok(Self { num_processes, cells })
    }

    /// Number of actors the topology connects.
    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    /// Splits the matrix into per-actor endpoint sets.
    ///
    /// For every cell `(i, j)`:
    /// - `i == j`: both endpoints are released
    /// - otherwise the forward end goes to `i`, the reverse end to `j`
    ///
    /// Every endpoint that is not handed out is dropped here, so after this
    /// call no endpoint is held by more than one actor.
    pub fn into_endpoints(self) -> Vec<ActorEndpoints<E>> {
        let mut endpoints: Vec<ActorEndpoints<E>> = ActorId::all(self.num_processes)
            .map(ActorEndpoints::empty)
            .collect();

        let mut released = 0usize;
        for (i, row) in self.cells.into_iter().enumerate() {
            for (j, channel) in row.into_iter().enumerate() {
                if i == j {
                    drop(channel);
                    released += 2;
                    continue;
                }
                endpoints[i].outbound.insert(ActorId(j), channel.forward);
                endpoints[j].inbound.insert(ActorId(i), channel.reverse);
            }
        }

        debug!("Partitioned topology, released {} diagonal endpoints", released);
        endpoints
    }
}

/// The endpoints owned by a single actor.
pub struct ActorEndpoints<E> {
    pub(crate) id: ActorId,

    /// Forward ends of row `id`, keyed by destination
    pub(crate) outbound: BTreeMap<ActorId, E>,

    /// Reverse ends of column `id`, keyed by source
    pub(crate) inbound: BTreeMap<ActorId, E>,
}

impl<E> ActorEndpoints<E> {
    fn empty(id: ActorId) -> Self {
        Self {
            id,
            outbound: BTreeMap::new(),
            inbound: BTreeMap::new(),
        }
    }

    /// Owner of these endpoints.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Destinations this actor can send to.
    pub fn outbound_peers(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.outbound.keys().copied()
    }

    /// Sources this actor can receive from.
    pub fn inbound_peers(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.inbound.keys().copied()
    }

    /// Total number of endpoints held.
    pub fn len(&self) -> usize {
        self.outbound.len() + self.inbound.len()
    }

    /// True if no endpoints are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the set into `(outbound, inbound)` maps.
    pub fn into_parts(self) -> (BTreeMap<ActorId, E>, BTreeMap<ActorId, E>) {
        (self.outbound, self.inbound)
    }
}
