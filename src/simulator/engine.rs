use anyhow::{anyhow, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::action_slot::{ActionExecutor, ActionScheduler};
use super::churn::NodeChurnManager;
use super::config::{ConfigError, SimulationConfig};
use super::mining::MiningScheduler;
use super::network::Network;
use super::shared::{EventSink, TestFileSource};

/// Wires the churn, mining and action loops onto one network
pub struct SimulationEngine {
    config: Arc<SimulationConfig>,
    network: Arc<dyn Network>,
    files: Arc<dyn TestFileSource>,
    events: EventSink,
}

/// Running engine; cancel it, then join it
pub struct EngineHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SimulationEngine {
    pub fn new(
        config: SimulationConfig,
        network: Arc<dyn Network>,
        files: Arc<dyn TestFileSource>,
        events: EventSink,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            network,
            files,
            events,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Spawn every loop and return without waiting on any of them.
    ///
    /// The engine's event sink moves into the loops, so once the handle has
    /// been joined and in-flight actions finish the event channel closes.
    pub fn start(self, cancel: CancellationToken) -> EngineHandle {
        let config = self.config;
        info!("Randomizer running with params:\n{}", config);

        let mut tasks = Vec::with_capacity(3);

        let churn = NodeChurnManager::new(
            self.network.clone(),
            config.start_nodes,
            config.max_nodes,
            config.join_time,
            self.events.clone(),
        );
        tasks.push(tokio::spawn(churn.run(cancel.clone())));

        if config.actions.mine {
            let mining = MiningScheduler::new(
                self.network.clone(),
                config.fork_branching,
                config.fork_probability,
                config.block_time,
                self.events.clone(),
            );
            tasks.push(tokio::spawn(mining.run(cancel.clone())));
        } else {
            debug!("mining disabled");
        }

        let executor = ActionExecutor::new(self.network, self.files, &config);
        let actions = ActionScheduler::new(config.enabled_actions(), config.action_time, executor, self.events);
        tasks.push(tokio::spawn(actions.run(cancel.clone())));

        EngineHandle { cancel, tasks }
    }
}

impl EngineHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for every loop to exit. Loops only exit on cancellation.
    pub async fn join(self) -> Result<()> {
        let results = join_all(self.tasks).await;
        let panicked = results.iter().filter(|result| result.is_err()).count();
        if panicked > 0 {
            return Err(anyhow!("{} simulation task(s) panicked", panicked));
        }
        info!("simulation stopped");
        Ok(())
    }
}
