pub mod memory;

pub use memory::{MemoryDaemon, MemoryLedger, MemoryNetwork};

use anyhow::Result;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::simulator::order_book::DealProposal;

/// Role of a node in the simulated network
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Produces blocks and places asks
    Miner,
    /// Places bids and proposes deals
    Client,
    /// Query wildcard, never the type of an actual node
    Any,
}

impl NodeType {
    /// Whether a node of type `self` satisfies a query for `query`
    pub fn matches(self, query: NodeType) -> bool {
        query == NodeType::Any || self == query
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Miner => write!(f, "miner"),
            NodeType::Client => write!(f, "client"),
            NodeType::Any => write!(f, "any"),
        }
    }
}

/// Operations the engine needs from a node's daemon.
///
/// Every call is a single round trip; the engine never retries.
#[async_trait]
pub trait Daemon: Send + Sync {
    async fn mine_once(&self) -> Result<()>;

    async fn main_wallet_address(&self) -> Result<String>;

    async fn wallet_balance(&self, address: &str) -> Result<BigDecimal>;

    async fn transfer(&self, from: &str, to: &str, amount: &BigDecimal) -> Result<()>;

    async fn submit_ask(&self, miner: &str, size: u64, price: u64) -> Result<()>;

    async fn submit_bid(&self, address: &str, size: u64, price: u64) -> Result<()>;

    /// Raw newline-delimited JSON, one ask per line
    async fn order_book_asks(&self) -> Result<String>;

    /// Raw newline-delimited JSON, one bid per line
    async fn order_book_bids(&self) -> Result<String>;

    /// Imports a file into the node's local store and returns its content id
    async fn import_file(&self, path: &Path) -> Result<String>;

    async fn propose_deal(&self, proposal: &DealProposal) -> Result<String>;

    /// Returns the node's miner address, creating one if the node has none
    async fn ensure_miner_identity(&self) -> Result<String>;
}

/// A live participant of the network
pub struct Node {
    pub id: usize,
    pub node_type: NodeType,
    pub wallet_address: String,
    pub repo_path: PathBuf,
    pub daemon: Arc<dyn Daemon>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("wallet_address", &self.wallet_address)
            .field("repo_path", &self.repo_path)
            .finish()
    }
}

/// The node manager that owns the population.
///
/// Selection queries are answered from the live population at call time.
#[async_trait]
pub trait Network: Send + Sync {
    async fn add_node(&self, node_type: NodeType) -> Result<Arc<Node>>;

    async fn connect(&self, a: &Node, b: &Node) -> Result<()>;

    fn nodes(&self, node_type: NodeType) -> Vec<Arc<Node>>;

    fn node_counts(&self) -> HashMap<NodeType, usize>;

    fn random_node(&self, node_type: NodeType) -> Option<Arc<Node>>;

    /// Draws up to `count` distinct nodes; fewer when the population is smaller
    fn random_nodes(&self, node_type: NodeType, count: usize) -> Vec<Arc<Node>>;

    fn size(&self) -> usize;
}
