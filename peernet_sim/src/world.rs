//! SimWorld - the driver that wires up and runs the network.

use crate::report::RunSummary;

use peernet_core::{Actor, ActorConfig, Topology, TopologyError};
use peernet_env::{DuplexLinks, LinkError, LinkFactory, TransportKind};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Fatal driver errors. Any of these stops the run before or while actors start.
#[derive(Debug, Error)]
pub enum SimError {
    /// Fewer than two actors requested
    #[error("Invalid process count {0}: need at least 2")]
    InvalidProcessCount(usize),

    /// The channel matrix could not be built
    #[error("Topology construction failed: {0}")]
    Topology(#[from] TopologyError),

    /// The requested transport cannot be used here
    #[error("Transport unavailable: {0}")]
    Transport(#[from] LinkError),

    /// An actor task died
    #[error("Actor task failed: {0}")]
    ActorFailed(String),
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of actors (N)
    pub num_processes: usize,

    /// Reserved for a snapshot algorithm; accepted and reported, never used
    pub num_snapshots: usize,

    /// Master seed for every actor's generator
    pub seed: u64,

    /// Pause on each side of a balance report
    pub pace: Duration,

    /// Bound on waiting for a payload after its tag
    pub payload_timeout: Duration,

    /// Steps per actor (None = run until terminated externally)
    pub max_steps: Option<u64>,

    /// Channel transport
    pub transport: TransportKind,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_processes: 4,
            num_snapshots: 5,
            seed: 100,
            pace: Duration::from_secs(1),
            payload_timeout: Duration::from_millis(50),
            max_steps: None,
            transport: TransportKind::Duplex,
        }
    }
}

impl SimConfig {
    /// Sets the number of actors.
    pub fn with_num_processes(mut self, n: usize) -> Self {
        self.num_processes = n;
        self
    }

    /// Sets the reserved snapshot count.
    pub fn with_num_snapshots(mut self, n: usize) -> Self {
        self.num_snapshots = n;
        self
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the report pacing.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Bounds each actor to `steps` steps.
    pub fn with_max_steps(mut self, steps: Option<u64>) -> Self {
        self.max_steps = steps;
        self
    }

    /// Sets the channel transport.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Checks the configuration before anything is built.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_processes < 2 {
            return Err(SimError::InvalidProcessCount(self.num_processes));
        }
        Ok(())
    }

    /// Per-actor configuration derived from this run's settings.
    pub fn actor_config(&self) -> ActorConfig {
        ActorConfig {
            num_processes: self.num_processes,
            pace: self.pace,
            payload_timeout: self.payload_timeout,
        }
    }
}

/// The driver: builds the topology, starts one task per actor and waits
/// for all of them.
///
/// The driver never touches actor state; it only sees the reports actors
/// return when a bounded run ends, and reads whatever credit is still
/// queued on their channels after all of them have stopped.
pub struct SimWorld {
    config: SimConfig,
}

impl SimWorld {
    /// Creates a driver for a validated configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs over the transport named in the configuration.
    pub async fn run(&self) -> Result<RunSummary, SimError> {
        match self.config.transport {
            TransportKind::Duplex => self.run_with(&DuplexLinks::default()).await,
            #[cfg(unix)]
            TransportKind::Unix => self.run_with(&peernet_env::UnixLinks).await,
            #[cfg(not(unix))]
            TransportKind::Unix => Err(LinkError::unsupported(TransportKind::Unix).into()),
        }
    }

    /// Runs over an explicit link factory.
    ///
    /// Returns once every actor has finished, which only happens for bounded
    /// runs. Dropping the returned future aborts all actor tasks.
    pub async fn run_with<L: LinkFactory>(&self, links: &L) -> Result<RunSummary, SimError> {
        let n = self.config.num_processes;
        let topology = Topology::build(n, links)?;

        info!(
            "Starting {} actors over {} links (seed={}, snapshots reserved={})",
            n,
            links.name(),
            self.config.seed,
            self.config.num_snapshots
        );

        let max_steps = self.config.max_steps;
        let mut tasks = JoinSet::new();
        for endpoints in topology.into_endpoints() {
            let mut actor = Actor::seeded(endpoints, self.config.seed, self.config.actor_config());
            tasks.spawn(async move {
                actor.run_steps(max_steps).await;
                actor.into_inbound()
            });
        }

        let mut actors = Vec::with_capacity(n);
        let mut leftovers = Vec::with_capacity(n);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((report, inbound)) => {
                    debug!("Actor {} reaped", report.id);
                    actors.push(report);
                    leftovers.push(inbound);
                }
                Err(e) => return Err(SimError::ActorFailed(e.to_string())),
            }
        }
        actors.sort_by_key(|r| r.id);

        // Every sender is released now; what is left on the channels is in flight
        let mut queued_credit = 0;
        for inbound in &mut leftovers {
            queued_credit += inbound.drain_queued(self.config.payload_timeout).await;
        }

        Ok(RunSummary {
            seed: self.config.seed,
            num_processes: n,
            num_snapshots: self.config.num_snapshots,
            transport: links.name().to_string(),
            actors,
            queued_credit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peernet_env::ActorId;
    use proptest::prelude::*;

    fn fast_config(n: usize, steps: u64) -> SimConfig {
        SimConfig::default()
            .with_num_processes(n)
            .with_pace(Duration::ZERO)
            .with_max_steps(Some(steps))
    }

    #[test]
    fn test_sim_config_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.num_processes, 4);
        assert_eq!(config.num_snapshots, 5);
        assert_eq!(config.seed, 100);
        assert_eq!(config.max_steps, None);
        assert_eq!(config.transport, TransportKind::Duplex);
    }

    #[test]
    fn test_rejects_too_few_processes() {
        for n in [0, 1] {
            let result = SimWorld::new(SimConfig::default().with_num_processes(n));
            assert!(matches!(result, Err(SimError::InvalidProcessCount(got)) if got == n));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bounded_run_conserves_money() {
        let world = SimWorld::new(fast_config(4, 25)).unwrap();
        let summary = world.run().await.unwrap();

        assert_eq!(summary.actors.len(), 4);
        for (k, report) in summary.actors.iter().enumerate() {
            assert_eq!(report.id, ActorId(k));
            assert_eq!(report.stats.steps, 25);
        }
        assert_eq!(summary.in_flight(), summary.counted_in_flight());
        assert!(summary.is_conserved());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bounded_run_over_socket_pairs() {
        let config = fast_config(3, 10).with_transport(TransportKind::Unix);
        let summary = SimWorld::new(config).unwrap().run().await.unwrap();

        assert_eq!(summary.transport, "unix");
        assert_eq!(summary.actors.len(), 3);
        assert!(summary.is_conserved());
    }

    #[tokio::test]
    async fn test_dropping_the_run_stops_unbounded_actors() {
        let world = SimWorld::new(fast_config(3, 0).with_max_steps(None)).unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(200), world.run()).await;
        assert!(outcome.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_any_network_size_conserves(n in 2usize..7, seed in any::<u64>()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let config = fast_config(n, 6).with_seed(seed);
            let summary = rt.block_on(SimWorld::new(config).unwrap().run()).unwrap();

            prop_assert_eq!(summary.actors.len(), n);
            prop_assert_eq!(summary.in_flight(), summary.counted_in_flight());
            prop_assert!(summary.is_conserved());
        }
    }
}
