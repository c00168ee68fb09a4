//! Scripted collaborators for unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::simulator::network::{Daemon, Network, Node, NodeType};
use crate::simulator::order_book::DealProposal;
use crate::simulator::shared::TestFileSource;

#[derive(Debug, Clone, PartialEq)]
pub enum DaemonCall {
    MineOnce,
    CreateMinerIdentity,
    Transfer { from: String, to: String, amount: BigDecimal },
    SubmitAsk { miner: String, size: u64, price: u64 },
    SubmitBid { address: String, size: u64, price: u64 },
    ImportFile(PathBuf),
    ProposeDeal(DealProposal),
}

/// Daemon whose answers are fixed up front and whose calls are recorded
pub struct ScriptedDaemon {
    pub wallet: String,
    pub balance: BigDecimal,
    pub miner: Mutex<Option<String>>,
    pub asks: String,
    pub bids: String,
    pub transfer_delay: Option<Duration>,
    pub fail_mining: bool,
    pub calls: Mutex<Vec<DaemonCall>>,
}

impl ScriptedDaemon {
    pub fn new(wallet: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            balance: BigDecimal::from(10_000),
            miner: Mutex::new(None),
            asks: String::new(),
            bids: String::new(),
            transfer_delay: None,
            fail_mining: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<DaemonCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: DaemonCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Daemon for ScriptedDaemon {
    async fn mine_once(&self) -> Result<()> {
        self.record(DaemonCall::MineOnce);
        if self.fail_mining {
            return Err(anyhow!("mining failed"));
        }
        Ok(())
    }

    async fn main_wallet_address(&self) -> Result<String> {
        Ok(self.wallet.clone())
    }

    async fn wallet_balance(&self, _address: &str) -> Result<BigDecimal> {
        Ok(self.balance.clone())
    }

    async fn transfer(&self, from: &str, to: &str, amount: &BigDecimal) -> Result<()> {
        self.record(DaemonCall::Transfer {
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.clone(),
        });
        if let Some(delay) = self.transfer_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn submit_ask(&self, miner: &str, size: u64, price: u64) -> Result<()> {
        self.record(DaemonCall::SubmitAsk { miner: miner.to_string(), size, price });
        Ok(())
    }

    async fn submit_bid(&self, address: &str, size: u64, price: u64) -> Result<()> {
        self.record(DaemonCall::SubmitBid { address: address.to_string(), size, price });
        Ok(())
    }

    async fn order_book_asks(&self) -> Result<String> {
        Ok(self.asks.clone())
    }

    async fn order_book_bids(&self) -> Result<String> {
        Ok(self.bids.clone())
    }

    async fn import_file(&self, path: &Path) -> Result<String> {
        self.record(DaemonCall::ImportFile(path.to_path_buf()));
        Ok("QmContent\n".to_string())
    }

    async fn propose_deal(&self, proposal: &DealProposal) -> Result<String> {
        self.record(DaemonCall::ProposeDeal(proposal.clone()));
        Ok("accepted".to_string())
    }

    async fn ensure_miner_identity(&self) -> Result<String> {
        let mut miner = self.miner.lock().unwrap();
        if let Some(address) = miner.as_ref() {
            return Ok(address.clone());
        }
        self.record(DaemonCall::CreateMinerIdentity);
        let address = format!("miner-{}", self.wallet);
        *miner = Some(address.clone());
        Ok(address)
    }
}

/// Network over a fixed or growing list of scripted nodes
#[derive(Default)]
pub struct RecordingNetwork {
    pub nodes: Mutex<Vec<Arc<Node>>>,
    pub daemons: Mutex<Vec<Arc<ScriptedDaemon>>>,
    pub add_requests: Mutex<Vec<NodeType>>,
    pub connects: Mutex<Vec<(usize, usize)>>,
    pub fail_adds: AtomicBool,
}

impl RecordingNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Network preloaded with nodes built from the given daemons
    pub fn with_nodes(nodes: Vec<(NodeType, ScriptedDaemon)>) -> Self {
        let network = Self::new();
        for (node_type, daemon) in nodes {
            network.push(node_type, Arc::new(daemon));
        }
        network
    }

    pub fn push(&self, node_type: NodeType, daemon: Arc<ScriptedDaemon>) -> Arc<Node> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = Arc::new(Node {
            id: nodes.len(),
            node_type,
            wallet_address: daemon.wallet.clone(),
            repo_path: std::env::temp_dir().join(format!("repo-{}", daemon.wallet)),
            daemon: daemon.clone(),
        });
        nodes.push(node.clone());
        self.daemons.lock().unwrap().push(daemon);
        node
    }

    pub fn daemon(&self, idx: usize) -> Arc<ScriptedDaemon> {
        self.daemons.lock().unwrap()[idx].clone()
    }

    pub fn add_requests(&self) -> Vec<NodeType> {
        self.add_requests.lock().unwrap().clone()
    }

    pub fn connects(&self) -> Vec<(usize, usize)> {
        self.connects.lock().unwrap().clone()
    }

    fn matching(&self, node_type: NodeType) -> Vec<Arc<Node>> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|node| node.node_type.matches(node_type))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Network for RecordingNetwork {
    async fn add_node(&self, node_type: NodeType) -> Result<Arc<Node>> {
        self.add_requests.lock().unwrap().push(node_type);
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(anyhow!("daemon failed to start"));
        }
        let resolved = match node_type {
            NodeType::Any => NodeType::Client,
            other => other,
        };
        let wallet = format!("wallet-{}", self.nodes.lock().unwrap().len());
        Ok(self.push(resolved, Arc::new(ScriptedDaemon::new(&wallet))))
    }

    async fn connect(&self, a: &Node, b: &Node) -> Result<()> {
        self.connects.lock().unwrap().push((a.id, b.id));
        Ok(())
    }

    fn nodes(&self, node_type: NodeType) -> Vec<Arc<Node>> {
        self.matching(node_type)
    }

    fn node_counts(&self) -> HashMap<NodeType, usize> {
        let mut counts = HashMap::new();
        for node in self.nodes.lock().unwrap().iter() {
            *counts.entry(node.node_type).or_insert(0) += 1;
        }
        counts
    }

    fn random_node(&self, node_type: NodeType) -> Option<Arc<Node>> {
        self.matching(node_type).into_iter().next()
    }

    fn random_nodes(&self, node_type: NodeType, count: usize) -> Vec<Arc<Node>> {
        self.matching(node_type).into_iter().take(count).collect()
    }

    fn size(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }
}

/// File source that hands back a fixed path without touching the disk
pub struct FixedFile(pub PathBuf);

#[async_trait]
impl TestFileSource for FixedFile {
    async fn pick_random_file(&self, _source_dir: &Path, dest_dir: &Path) -> Result<PathBuf> {
        Ok(dest_dir.join(&self.0))
    }
}
