//! Per-actor randomness and step planning.
//!
//! Every scheduling and protocol decision an actor makes is drawn from its
//! own `RandomSource`. Production actors use `SeededRandom`, a ChaCha8
//! stream derived from `(master seed, actor id)`; tests can substitute a
//! `ScriptedRandom` that replays a fixed sequence of draws.

use peernet_env::ActorId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::time::Duration;

/// One in `SEND_ODDS` steps is a receive step, the rest are sends.
pub const SEND_ODDS: u32 = 5;

/// Transfer amounts are drawn from `[0, AMOUNT_BOUND)`.
pub const AMOUNT_BOUND: u32 = 256;

/// Receive waits are drawn from `[0, WAIT_BOUND_MS)` milliseconds.
pub const WAIT_BOUND_MS: u32 = 300;

/// Source of uniform draws for one actor.
pub trait RandomSource: Send + 'static {
    /// Returns a uniform integer in `[0, bound)`.
    fn below(&mut self, bound: u32) -> u32;
}

/// Derives the seed of an actor's generator.
///
/// Same master seed and id always give the same stream; different ids
/// give independent streams.
pub fn actor_seed(master_seed: u64, id: ActorId) -> u64 {
    master_seed
        .wrapping_mul(0x9e3779b97f4a7c15) // Golden ratio prime
        .wrapping_add((id.index() as u64).wrapping_mul(0x517cc1b727220a95))
}

/// Deterministic ChaCha8-backed generator.
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Creates a generator from a raw seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates the generator owned by actor `id`.
    pub fn for_actor(master_seed: u64, id: ActorId) -> Self {
        Self::new(actor_seed(master_seed, id))
    }
}

impl RandomSource for SeededRandom {
    fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }
}

/// Replays a fixed sequence of draws.
///
/// Values at or above the requested bound are clamped to `bound - 1`.
/// Once the script is exhausted every draw is `0`, which plans a receive
/// step with no wait.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    script: VecDeque<u32>,
}

impl ScriptedRandom {
    /// Creates a source that replays `draws` in order.
    pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
        Self {
            script: draws.into_iter().collect(),
        }
    }

    /// Number of draws left in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn below(&mut self, bound: u32) -> u32 {
        let value = self.script.pop_front().unwrap_or(0);
        value.min(bound.saturating_sub(1))
    }
}

/// What an actor does in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlan {
    /// Transfer `amount` to `to`
    Send { to: ActorId, amount: u8 },

    /// Wait up to `wait` for inbound frames, then drain them
    Receive { wait: Duration },
}

/// Picks a peer uniformly among the `num_processes - 1` actors other than `me`.
///
/// Draws from `[0, N-1)` and maps a hit on `me` to the last id, which the
/// draw itself can never produce.
pub fn pick_peer<R: RandomSource + ?Sized>(
    rng: &mut R,
    me: ActorId,
    num_processes: usize,
) -> ActorId {
    let draw = rng.below(num_processes.saturating_sub(1) as u32) as usize;
    if draw == me.index() {
        ActorId(num_processes - 1)
    } else {
        ActorId(draw)
    }
}

/// Draws the next step for actor `me`.
///
/// Draw order is fixed: choice, then destination and amount (send) or wait
/// bound (receive).
pub fn plan_step<R: RandomSource + ?Sized>(
    rng: &mut R,
    me: ActorId,
    num_processes: usize,
) -> StepPlan {
    if rng.below(SEND_ODDS) != 0 {
        let to = pick_peer(rng, me, num_processes);
        let amount = rng.below(AMOUNT_BOUND) as u8;
        StepPlan::Send { to, amount }
    } else {
        let wait = Duration::from_millis(rng.below(WAIT_BOUND_MS) as u64);
        StepPlan::Receive { wait }
    }
}
