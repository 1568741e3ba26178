//! Actor Runtime - the per-actor send/receive loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Actor k                             │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ RandomSource (seeded from master seed + k)           │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │            │ plan_step()                                    │
//! │     ┌──────┴───────┐                                        │
//! │     ▼              ▼                                        │
//! │  ┌───────┐   ┌─────────────────────────────┐                │
//! │  │ SEND  │   │ RECEIVE                     │                │
//! │  │ row k │   │ WaitSet over column k       │                │
//! │  └───────┘   └─────────────────────────────┘                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! An actor is created from the endpoints it owns (`INIT`) and then steps
//! forever (`RUNNING`). Each step either fires one credit at a random peer
//! or waits a random bounded time for inbound frames and drains one frame
//! from every ready endpoint. Errors inside a step are logged and counted;
//! they never end the loop.
//!
//! # Usage
//!
//! ```ignore
//! use peernet_core::{Actor, ActorConfig, Topology};
//! use peernet_env::DuplexLinks;
//!
//! let topology = Topology::build(4, &DuplexLinks::default())?;
//! for endpoints in topology.into_endpoints() {
//!     let actor = Actor::seeded(endpoints, 100, ActorConfig::default());
//!     tokio::spawn(actor.run(None));
//! }
//! ```

use crate::protocol::{Message, ProtocolError};
use crate::random::{plan_step, RandomSource, SeededRandom, StepPlan};
use crate::topology::ActorEndpoints;
use crate::wait_set::WaitSet;

use peernet_env::ActorId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Balance every actor starts with.
pub const INITIAL_BALANCE: i64 = 100;

/// Errors raised by the send branch. None of them are fatal.
#[derive(Debug, Error)]
pub enum SendError {
    /// No outbound endpoint for that actor
    #[error("No channel to actor {0}")]
    UnknownPeer(ActorId),

    /// The channel cannot take the frame right now
    #[error("Channel to actor {0} is full")]
    Backpressure(ActorId),

    /// The write failed (peer endpoint released, etc.)
    #[error("Write to actor {peer} failed: {source}")]
    Io {
        peer: ActorId,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for an actor.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Size of the network (N)
    pub num_processes: usize,

    /// Pause before and after each balance report (default: 1s)
    pub pace: Duration,

    /// How long to wait for a payload once its tag has been read (default: 50ms)
    pub payload_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            num_processes: 4,
            pace: Duration::from_secs(1),
            payload_timeout: Duration::from_millis(50),
        }
    }
}

/// Counters kept by each actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStats {
    /// Steps completed
    pub steps: u64,

    /// Credits handed to a channel
    pub sent_count: u64,

    /// Sum of credited amounts sent
    pub sent_amount: u64,

    /// Credits applied
    pub received_count: u64,

    /// Sum of credited amounts applied
    pub received_amount: u64,

    /// Unknown kinds and truncated frames
    pub protocol_errors: u64,

    /// Failed or closed reads
    pub read_errors: u64,

    /// Sends that never reached the channel
    pub send_failures: u64,
}

/// Final state of an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorReport {
    pub id: ActorId,
    pub balance: i64,
    #[serde(flatten)]
    pub stats: ActorStats,
}

/// One peer in the network.
///
/// Generic over the endpoint type (so the same loop runs over in-memory
/// pipes or socket pairs) and over the randomness source (so tests can
/// script every decision).
pub struct Actor<E, R> {
    id: ActorId,
    balance: i64,
    config: ActorConfig,
    rng: R,
    outbound: BTreeMap<ActorId, E>,
    inbound: WaitSet<E>,
    stats: ActorStats,
}

impl<E> Actor<E, SeededRandom>
where
    E: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Creates an actor whose generator is derived from `(master_seed, id)`.
    pub fn seeded(endpoints: ActorEndpoints<E>, master_seed: u64, config: ActorConfig) -> Self {
        let rng = SeededRandom::for_actor(master_seed, endpoints.id());
        Self::new(endpoints, rng, config)
    }
}

impl<E, R> Actor<E, R>
where
    E: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    R: RandomSource,
{
    /// Initializes an actor from the endpoints it owns.
    ///
    /// The outbound ends are kept for sending; the inbound ends are moved
    /// into a wait set tagged by sender.
    pub fn new(endpoints: ActorEndpoints<E>, rng: R, config: ActorConfig) -> Self {
        let id = endpoints.id();
        let (outbound, inbound) = endpoints.into_parts();

        debug!(
            "Actor {} initialized with {} outbound / {} inbound channels",
            id,
            outbound.len(),
            inbound.len()
        );

        Self {
            id,
            balance: INITIAL_BALANCE,
            config,
            rng,
            outbound,
            inbound: WaitSet::new(inbound),
            stats: ActorStats::default(),
        }
    }

    /// Returns the actor's id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Returns the current balance.
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Returns the actor's counters.
    pub fn stats(&self) -> &ActorStats {
        &self.stats
    }

    /// Snapshot of id, balance and counters.
    pub fn report(&self) -> ActorReport {
        ActorReport {
            id: self.id,
            balance: self.balance,
            stats: self.stats.clone(),
        }
    }

    /// Runs the loop.
    ///
    /// With `max_steps = None` this never returns; the actor stops only
    /// when its task is dropped or the process exits.
    pub async fn run(mut self, max_steps: Option<u64>) -> ActorReport {
        self.run_steps(max_steps).await;
        self.report()
    }

    /// Steps until `max_steps` steps have been taken in total, or forever.
    pub async fn run_steps(&mut self, max_steps: Option<u64>) {
        info!("Actor {} running with balance {}", self.id, self.balance);

        loop {
            if max_steps.is_some_and(|limit| self.stats.steps >= limit) {
                break;
            }
            self.step().await;
        }

        debug!("Actor {} finished after {} steps", self.id, self.stats.steps);
    }

    /// Stops the actor and hands back its inbound endpoints.
    ///
    /// Outbound endpoints are released here, so once every actor of a
    /// network has been taken apart the returned sets read to EOF.
    pub fn into_inbound(self) -> (ActorReport, WaitSet<E>) {
        let report = self.report();
        (report, self.inbound)
    }

    /// Executes one step and returns what was planned.
    pub async fn step(&mut self) -> StepPlan {
        let plan = plan_step(&mut self.rng, self.id, self.config.num_processes);

        match plan {
            StepPlan::Send { to, amount } => {
                if let Err(e) = self.send_credit(to, amount).await {
                    self.stats.send_failures += 1;
                    warn!("Actor {} could not send {} to actor {}: {}", self.id, amount, to, e);
                }
            }
            StepPlan::Receive { wait } => self.drain(wait).await,
        }

        self.pause().await;
        info!("process {}'s money: {}", self.id, self.balance);
        self.pause().await;

        self.stats.steps += 1;
        plan
    }

    /// Fires a credit at `to`.
    ///
    /// The balance is only debited once the frame is on the channel, so a
    /// failed send leaves the balance untouched.
    async fn send_credit(&mut self, to: ActorId, amount: u8) -> Result<(), SendError> {
        let stream = self.outbound.get_mut(&to).ok_or(SendError::UnknownPeer(to))?;
        let frame = Message::credit(amount).encode();

        try_write_frame(stream, to, &frame).await?;

        self.balance -= amount as i64;
        self.stats.sent_count += 1;
        self.stats.sent_amount += amount as u64;
        Ok(())
    }

    /// Waits up to `wait` and decodes one frame from every ready endpoint.
    async fn drain(&mut self, wait: Duration) {
        let ready = self.inbound.wait(wait).await;

        for position in ready {
            let (from, result) = self.inbound.read_one(position, self.config.payload_timeout).await;
            match result {
                Ok(message) => self.apply(message),
                Err(ProtocolError::Incomplete(kind)) => {
                    debug!("Actor {}: {:?} from actor {} awaits its payload", self.id, kind, from);
                }
                Err(ProtocolError::Closed) => {
                    self.stats.read_errors += 1;
                    debug!("Actor {}: channel from actor {} is closed", self.id, from);
                }
                Err(e @ (ProtocolError::UnknownKind(_) | ProtocolError::TruncatedFrame(_))) => {
                    self.stats.protocol_errors += 1;
                    warn!("Actor {}: bad frame from actor {}: {}", self.id, from, e);
                }
                Err(e) => {
                    self.stats.read_errors += 1;
                    warn!("Actor {}: read from actor {} failed: {}", self.id, from, e);
                }
            }
        }
    }

    fn apply(&mut self, message: Message) {
        match message {
            Message::Credit { amount } => {
                self.balance += amount as i64;
                self.stats.received_count += 1;
                self.stats.received_amount += amount as u64;
            }
        }
    }

    async fn pause(&mut self) {
        if self.config.pace.is_zero() {
            // Unpaced actors still hand the worker back between steps
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.pace).await;
        }
    }
}

/// Hands `frame` to the channel without waiting for room.
///
/// If the channel accepts nothing right now the send fails with
/// `Backpressure`. Once the first bytes are accepted the rest of the frame
/// is written to completion so frames are never split on the wire.
async fn try_write_frame<W>(stream: &mut W, peer: ActorId, frame: &[u8]) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    let first = poll_fn(|cx| match Pin::new(&mut *stream).poll_write(cx, frame) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    let io_error = |source: std::io::Error| SendError::Io { peer, source };
    match first {
        None => Err(SendError::Backpressure(peer)),
        Some(Err(source)) => Err(io_error(source)),
        Some(Ok(0)) => Err(io_error(std::io::ErrorKind::WriteZero.into())),
        Some(Ok(written)) if written < frame.len() => {
            stream.write_all(&frame[written..]).await.map_err(io_error)
        }
        Some(Ok(_)) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use crate::topology::Topology;
    use peernet_env::{DuplexLinks, LinkFactory};
    use tokio::io::DuplexStream;
    use tokio::task::JoinSet;

    fn test_config(num_processes: usize) -> ActorConfig {
        ActorConfig {
            num_processes,
            pace: Duration::ZERO,
            payload_timeout: Duration::from_millis(10),
        }
    }

    fn endpoints(n: usize, capacity: usize) -> Vec<ActorEndpoints<DuplexStream>> {
        Topology::build(n, &DuplexLinks::new(capacity))
            .unwrap()
            .into_endpoints()
    }

    fn scripted(
        endpoints: ActorEndpoints<DuplexStream>,
        draws: &[u32],
        n: usize,
    ) -> Actor<DuplexStream, ScriptedRandom> {
        Actor::new(endpoints, ScriptedRandom::new(draws.iter().copied()), test_config(n))
    }

    #[test]
    fn test_actor_config_default() {
        let config = ActorConfig::default();
        assert_eq!(config.num_processes, 4);
        assert_eq!(config.pace, Duration::from_secs(1));
        assert_eq!(config.payload_timeout, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_scripted_exchange_conserves_money() {
        let mut sets = endpoints(2, 64);
        let b_eps = sets.pop().unwrap();
        let a_eps = sets.pop().unwrap();

        // send (peer draw 0 -> actor 1) 30, then receive waiting up to 100ms
        let mut a = scripted(a_eps, &[1, 0, 30, 0, 100], 2);
        // send (peer draw 0 -> actor 0) 10, then receive waiting up to 100ms
        let mut b = scripted(b_eps, &[1, 0, 10, 0, 100], 2);

        assert_eq!(a.step().await, StepPlan::Send { to: ActorId(1), amount: 30 });
        assert_eq!(b.step().await, StepPlan::Send { to: ActorId(0), amount: 10 });
        assert_eq!(a.balance() + b.balance(), 160);

        a.step().await;
        b.step().await;

        assert_eq!(a.balance(), 80);
        assert_eq!(b.balance(), 120);
        assert_eq!(a.balance() + b.balance(), 200);
        assert_eq!(a.stats().received_amount, 10);
        assert_eq!(b.stats().sent_amount, 10);
    }

    #[tokio::test]
    async fn test_peer_balance_changes_only_on_receipt() {
        let mut sets = endpoints(2, 64);
        let b_eps = sets.pop().unwrap();
        let a_eps = sets.pop().unwrap();

        let mut a = scripted(a_eps, &[1, 0, 50], 2);
        // Two receive steps: the first with nothing to read yet
        let mut b = scripted(b_eps, &[0, 0, 0, 50], 2);

        b.step().await;
        assert_eq!(b.balance(), INITIAL_BALANCE);

        a.step().await;
        assert_eq!(a.balance(), 50);
        assert_eq!(b.balance(), INITIAL_BALANCE);

        b.step().await;
        assert_eq!(b.balance(), 150);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_inert() {
        let mut sets = endpoints(3, 64);

        sets[1]
            .outbound
            .get_mut(&ActorId(0))
            .unwrap()
            .write_all(&[0x02])
            .await
            .unwrap();
        sets[2]
            .outbound
            .get_mut(&ActorId(0))
            .unwrap()
            .write_all(&Message::credit(25).encode())
            .await
            .unwrap();

        let receiver_eps = sets.remove(0);
        let mut receiver = scripted(receiver_eps, &[0, 200], 3);
        receiver.step().await;

        assert_eq!(receiver.balance(), 125);
        assert_eq!(receiver.stats().protocol_errors, 1);
        assert_eq!(receiver.stats().received_count, 1);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_skipped() {
        let mut sets = endpoints(2, 64);
        let mut sender = sets.pop().unwrap();
        sender
            .outbound
            .get_mut(&ActorId(0))
            .unwrap()
            .write_all(&[crate::protocol::CREDIT_TAG])
            .await
            .unwrap();
        drop(sender);

        let mut receiver = scripted(sets.remove(0), &[0, 100], 2);
        receiver.step().await;

        assert_eq!(receiver.balance(), INITIAL_BALANCE);
        assert_eq!(receiver.stats().protocol_errors, 1);
    }

    #[tokio::test]
    async fn test_late_payload_is_credited_on_a_later_step() {
        let mut sets = endpoints(2, 64);
        let mut sender = sets.pop().unwrap();
        let channel = sender.outbound.get_mut(&ActorId(0)).unwrap();
        channel.write_all(&[crate::protocol::CREDIT_TAG]).await.unwrap();

        let mut receiver = scripted(sets.remove(0), &[0, 100, 0, 100, 0, 100], 2);
        receiver.step().await;
        assert_eq!(receiver.balance(), INITIAL_BALANCE);
        assert_eq!(receiver.stats().protocol_errors, 0);

        channel.write_all(&[7]).await.unwrap();
        channel.write_all(&Message::credit(5).encode()).await.unwrap();

        receiver.step().await;
        assert_eq!(receiver.balance(), 107);
        receiver.step().await;
        assert_eq!(receiver.balance(), 112);
        assert_eq!(receiver.stats().received_count, 2);
        assert_eq!(receiver.stats().protocol_errors, 0);
    }

    #[tokio::test]
    async fn test_closed_peer_does_not_stop_the_loop() {
        let mut sets = endpoints(2, 64);
        drop(sets.pop());
        let mut lonely = scripted(sets.pop().unwrap(), &[0, 100, 1, 0, 40], 2);

        lonely.step().await;
        assert_eq!(lonely.stats().read_errors, 1);

        // Peer is gone: the send fails and no money leaves the balance
        lonely.step().await;
        assert_eq!(lonely.stats().send_failures, 1);
        assert_eq!(lonely.balance(), INITIAL_BALANCE);
        assert_eq!(lonely.stats().steps, 2);
    }

    #[tokio::test]
    async fn test_full_channel_is_reported_not_blocking() {
        // Room for exactly one frame
        let mut sets = endpoints(2, 2);
        let _peer = sets.pop().unwrap();
        let mut sender = scripted(sets.pop().unwrap(), &[1, 0, 30, 1, 0, 40], 2);

        sender.step().await;
        sender.step().await;

        assert_eq!(sender.balance(), 70);
        assert_eq!(sender.stats().sent_count, 1);
        assert_eq!(sender.stats().send_failures, 1);
    }

    #[tokio::test]
    async fn test_bounded_run_reports() {
        let mut sets = endpoints(2, 64);
        let _peer = sets.pop().unwrap();
        let actor = Actor::seeded(sets.pop().unwrap(), 100, test_config(2));

        let report = actor.run(Some(5)).await;
        assert_eq!(report.id, ActorId(0));
        assert_eq!(report.stats.steps, 5);
        assert_eq!(
            report.balance,
            INITIAL_BALANCE - report.stats.sent_amount as i64 + report.stats.received_amount as i64
        );
    }

    fn spawn_network<L: LinkFactory>(links: &L, n: usize, steps: u64) -> JoinSet<ActorReport> {
        let mut tasks = JoinSet::new();
        for endpoints in Topology::build(n, links).unwrap().into_endpoints() {
            let actor = Actor::seeded(endpoints, 7, test_config(n));
            tasks.spawn(actor.run(Some(steps)));
        }
        tasks
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_actors_spawn_over_any_link_factory() {
        let mut tasks = spawn_network(&DuplexLinks::default(), 3, 4);

        let mut steps = 0;
        while let Some(joined) = tasks.join_next().await {
            steps += joined.unwrap().stats.steps;
        }
        assert_eq!(steps, 12);
    }

    #[tokio::test]
    async fn test_into_inbound_holds_undelivered_credit() {
        let mut sets = endpoints(2, 64);
        let b_eps = sets.pop().unwrap();
        let a_eps = sets.pop().unwrap();

        let mut a = scripted(a_eps, &[1, 0, 30], 2);
        let b = scripted(b_eps, &[], 2);
        a.run_steps(Some(1)).await;

        let (a_report, mut a_inbound) = a.into_inbound();
        let (b_report, mut b_inbound) = b.into_inbound();
        let timeout = Duration::from_millis(10);
        let queued = a_inbound.drain_queued(timeout).await + b_inbound.drain_queued(timeout).await;

        assert_eq!(queued, 30);
        assert_eq!(a_report.balance + b_report.balance + queued as i64, 200);
    }
}
