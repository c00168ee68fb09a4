use tokio::sync::mpsc;

use crate::simulator::action_slot::{Action, ActionResult};
use crate::simulator::network::NodeType;

/// Something the engine did, reported to whoever consumes the event channel
#[derive(Debug)]
pub enum SimEvent {
    NodeAdded { id: usize, node_type: NodeType },
    NodeAddFailed { node_type: NodeType, error: String },
    PeersConnected { a: usize, b: usize },
    ConnectFailed { a: usize, b: usize, error: String },
    BlockMined { epoch: u64, node: usize },
    MiningFailed { epoch: u64, node: usize, error: String },
    ActionFinished { action: Action, result: ActionResult },
}

/// Sending half of the engine's event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SimEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SimEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Events are dropped once the consumer has gone away
    pub fn emit(&self, event: SimEvent) {
        let _ = self.tx.send(event);
    }
}
