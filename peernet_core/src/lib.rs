//! peernet Core - a closed network of actors trading credits
//!
//! This library provides the substrate distributed-state algorithms are
//! studied on:
//! 1. **Topology**: one directed channel per ordered pair of actors, with
//!    endpoint ownership split so no two actors share an endpoint
//! 2. **Protocol**: a two-byte `Credit` frame
//! 3. **Runtime**: a per-actor loop that randomly sends credits or drains
//!    inbound channels through a bounded multiplexed wait
//!
//! Money is conserved: the sum of all balances plus the amounts still in
//! flight always equals `100 * N`.

pub mod actor_runtime;
pub mod protocol;
pub mod random;
pub mod topology;
pub mod wait_set;

// Re-export key types for convenience
pub use actor_runtime::{Actor, ActorConfig, ActorReport, ActorStats, SendError, INITIAL_BALANCE};
pub use protocol::{read_frame, read_message, Message, MessageKind, ProtocolError};
pub use random::{plan_step, RandomSource, ScriptedRandom, SeededRandom, StepPlan};
pub use topology::{ActorEndpoints, Channel, Topology, TopologyError};
pub use wait_set::WaitSet;
