use futures::future::join_all;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::simulator::network::{Network, Node, NodeType};
use crate::simulator::shared::{periodic, EventSink, SimEvent};

/// Bernoulli trial deciding whether a drawn miner mines this epoch.
///
/// Probabilities within 0.001 of either bound are treated as exact.
pub fn roll_to_mine<R: Rng + ?Sized>(probability: f64, rng: &mut R) -> bool {
    if probability <= 0.001 {
        return false;
    }
    if probability >= 0.999 {
        return true;
    }
    rng.r#gen::<f64>() < probability
}

/// Drives block production, one epoch per block time
pub struct MiningScheduler {
    network: Arc<dyn Network>,
    fork_branching: usize,
    fork_probability: f64,
    block_time: Duration,
    events: EventSink,
    epoch: AtomicU64,
}

impl MiningScheduler {
    pub fn new(
        network: Arc<dyn Network>,
        fork_branching: usize,
        fork_probability: f64,
        block_time: Duration,
        events: EventSink,
    ) -> Self {
        Self {
            network,
            fork_branching,
            fork_probability,
            block_time,
            events,
            epoch: AtomicU64::new(0),
        }
    }

    /// Draw up to `fork_branching` miners and keep those whose roll succeeds
    pub fn select_miners<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Arc<Node>> {
        self.network
            .random_nodes(NodeType::Miner, self.fork_branching)
            .into_iter()
            .filter(|_| roll_to_mine(self.fork_probability, rng))
            .collect()
    }

    /// Run one epoch and wait for every mining attempt in it.
    ///
    /// Returns the epoch number and how many attempts were made.
    pub async fn mine_epoch(&self) -> (u64, usize) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst);
        let miners = self.select_miners(&mut rand::thread_rng());
        debug!(epoch, miners = miners.len(), "mining epoch");

        let attempts = miners.iter().map(|node| async move { (node.id, node.daemon.mine_once().await) });
        let results = join_all(attempts).await;

        for (node, result) in &results {
            match result {
                Ok(()) => self.events.emit(SimEvent::BlockMined { epoch, node: *node }),
                Err(e) => self.events.emit(SimEvent::MiningFailed {
                    epoch,
                    node: *node,
                    error: format!("{:#}", e),
                }),
            }
        }

        (epoch, results.len())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub async fn run(self, cancel: CancellationToken) {
        let this = &self;
        periodic(&cancel, self.block_time, || async move {
            this.mine_epoch().await;
        })
        .await;
    }
}
