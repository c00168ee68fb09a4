use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::simulator::network::{Network, NodeType};
use crate::simulator::shared::{periodic, EventSink, SimEvent};

/// Type of the `index`-th bootstrap node: even indices mine, odd ones are clients
pub fn bootstrap_node_type(index: usize) -> NodeType {
    if index % 2 == 0 { NodeType::Miner } else { NodeType::Client }
}

/// Keep clients at or above one and a half times the miners
pub fn next_node_type(counts: &HashMap<NodeType, usize>) -> NodeType {
    let miners = counts.get(&NodeType::Miner).copied().unwrap_or(0) as f64;
    let clients = counts.get(&NodeType::Client).copied().unwrap_or(0) as f64;

    if clients < miners * 1.5 { NodeType::Client } else { NodeType::Any }
}

/// Grows the node population: an initial batch, then one join per tick up to a cap
pub struct NodeChurnManager {
    network: Arc<dyn Network>,
    start_nodes: usize,
    max_nodes: usize,
    join_time: Duration,
    events: EventSink,
}

impl NodeChurnManager {
    pub fn new(
        network: Arc<dyn Network>,
        start_nodes: usize,
        max_nodes: usize,
        join_time: Duration,
        events: EventSink,
    ) -> Self {
        Self {
            network,
            start_nodes,
            max_nodes,
            join_time,
            events,
        }
    }

    /// Create the starting nodes concurrently, wait for all of them, then
    /// connect every known pair. Returns how many nodes were created.
    pub async fn bootstrap(&self) -> usize {
        info!(nodes = self.start_nodes, "starting initial nodes");

        let creations = (0..self.start_nodes).map(|index| self.add_node(bootstrap_node_type(index)));
        let created = join_all(creations).await.into_iter().filter(|added| *added).count();

        self.connect_all_pairs().await;
        created
    }

    /// Connect each unordered pair of live nodes once. Returns the number of
    /// successful connections.
    pub async fn connect_all_pairs(&self) -> usize {
        let nodes = self.network.nodes(NodeType::Any);
        let mut connected = 0;

        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                match self.network.connect(a, b).await {
                    Ok(()) => {
                        connected += 1;
                        self.events.emit(SimEvent::PeersConnected { a: a.id, b: b.id });
                    }
                    Err(e) => self.events.emit(SimEvent::ConnectFailed {
                        a: a.id,
                        b: b.id,
                        error: format!("{:#}", e),
                    }),
                }
            }
        }

        connected
    }

    /// One join tick. Returns the requested type, or `None` when the
    /// population is already at the cap.
    pub async fn grow_tick(&self) -> Option<NodeType> {
        let size = self.network.size();
        if size >= self.max_nodes {
            debug!(size, max = self.max_nodes, "network full, skipping join");
            return None;
        }

        let node_type = next_node_type(&self.network.node_counts());
        self.add_node(node_type).await;
        Some(node_type)
    }

    pub async fn run(self, cancel: CancellationToken) {
        self.bootstrap().await;

        let this = &self;
        periodic(&cancel, self.join_time, || async move {
            this.grow_tick().await;
        })
        .await;
    }

    async fn add_node(&self, node_type: NodeType) -> bool {
        match self.network.add_node(node_type).await {
            Ok(node) => {
                self.events.emit(SimEvent::NodeAdded {
                    id: node.id,
                    node_type: node.node_type,
                });
                true
            }
            Err(e) => {
                self.events.emit(SimEvent::NodeAddFailed {
                    node_type,
                    error: format!("{:#}", e),
                });
                false
            }
        }
    }
}
