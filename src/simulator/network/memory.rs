//! In-process network used by the CLI's default run mode and by tests.
//!
//! All nodes share one [`MemoryLedger`] standing in for chain state.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use super::{Daemon, Network, Node, NodeType};
use crate::simulator::order_book::{Ask, Bid, DealProposal};

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<String, BigDecimal>,
    /// miner address -> owning wallet
    miners: HashMap<String, String>,
    asks: Vec<Ask>,
    bids: Vec<Bid>,
    deals: Vec<DealProposal>,
    content: HashSet<String>,
}

/// Shared balances and order book
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn credit(&self, address: &str, amount: &BigDecimal) {
        let mut state = self.state();
        let balance = state.balances.entry(address.to_string()).or_default();
        *balance += amount;
    }

    pub fn balance(&self, address: &str) -> BigDecimal {
        self.state().balances.get(address).cloned().unwrap_or_default()
    }

    pub fn transfer(&self, from: &str, to: &str, amount: &BigDecimal) -> Result<()> {
        let mut state = self.state();
        let available = state.balances.get(from).cloned().unwrap_or_default();
        if &available < amount {
            return Err(anyhow!("Insufficient funds in {}: have {}, need {}", from, available, amount));
        }
        state.balances.insert(from.to_string(), available - amount);
        *state.balances.entry(to.to_string()).or_default() += amount;
        Ok(())
    }

    pub fn register_miner(&self, miner: &str, owner: &str) {
        self.state().miners.insert(miner.to_string(), owner.to_string());
    }

    pub fn add_ask(&self, miner: &str, owner: &str, size: u64, price: u64) -> Result<u64> {
        let mut state = self.state();
        match state.miners.get(miner) {
            Some(registered) if registered == owner => {}
            _ => return Err(anyhow!("Unknown miner {} for wallet {}", miner, owner)),
        }
        let id = state.asks.len() as u64;
        state.asks.push(Ask {
            id,
            price: BigDecimal::from(price),
            size: BigDecimal::from(size),
            owner: Some(miner.to_string()),
        });
        Ok(id)
    }

    pub fn add_bid(&self, owner: &str, size: u64, price: u64) -> u64 {
        let mut state = self.state();
        let id = state.bids.len() as u64;
        state.bids.push(Bid {
            id,
            price: BigDecimal::from(price),
            size: BigDecimal::from(size),
            owner: owner.to_string(),
            used: false,
        });
        id
    }

    pub fn asks_ndjson(&self) -> Result<String> {
        to_ndjson(&self.state().asks)
    }

    pub fn bids_ndjson(&self) -> Result<String> {
        to_ndjson(&self.state().bids)
    }

    pub fn store_content(&self, content_id: &str) {
        self.state().content.insert(content_id.to_string());
    }

    /// Record a deal and consume its bid
    pub fn propose(&self, proposal: &DealProposal) -> Result<String> {
        let mut guard = self.state();
        let state = &mut *guard;
        if !state.content.contains(&proposal.content_id) {
            return Err(anyhow!("Unknown content {}", proposal.content_id));
        }
        let ask = state
            .asks
            .iter()
            .find(|ask| ask.id == proposal.ask_id)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown ask {}", proposal.ask_id))?;
        let bid = state
            .bids
            .iter_mut()
            .find(|bid| bid.id == proposal.bid_id)
            .ok_or_else(|| anyhow!("Unknown bid {}", proposal.bid_id))?;
        if bid.used {
            return Err(anyhow!("Bid {} already used", bid.id));
        }
        if !bid.fits(&ask) {
            return Err(anyhow!("Bid {} does not fit ask {}", bid.id, ask.id));
        }
        bid.used = true;
        state.deals.push(proposal.clone());
        Ok(serde_json::to_string(proposal)?)
    }

    pub fn deals(&self) -> Vec<DealProposal> {
        self.state().deals.clone()
    }
}

fn to_ndjson<T: serde::Serialize>(records: &[T]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Daemon of one in-memory node
#[derive(Debug)]
pub struct MemoryDaemon {
    ledger: Arc<MemoryLedger>,
    wallet: String,
    miner: Mutex<Option<String>>,
    block_reward: BigDecimal,
}

impl MemoryDaemon {
    pub fn new(ledger: Arc<MemoryLedger>, wallet: String, block_reward: BigDecimal) -> Self {
        Self {
            ledger,
            wallet,
            miner: Mutex::new(None),
            block_reward,
        }
    }
}

#[async_trait]
impl Daemon for MemoryDaemon {
    async fn mine_once(&self) -> Result<()> {
        self.ledger.credit(&self.wallet, &self.block_reward);
        Ok(())
    }

    async fn main_wallet_address(&self) -> Result<String> {
        Ok(self.wallet.clone())
    }

    async fn wallet_balance(&self, address: &str) -> Result<BigDecimal> {
        Ok(self.ledger.balance(address))
    }

    async fn transfer(&self, from: &str, to: &str, amount: &BigDecimal) -> Result<()> {
        if from != self.wallet {
            return Err(anyhow!("Wallet {} is not owned by this node", from));
        }
        self.ledger.transfer(from, to, amount)
    }

    async fn submit_ask(&self, miner: &str, size: u64, price: u64) -> Result<()> {
        self.ledger.add_ask(miner, &self.wallet, size, price).map(|_| ())
    }

    async fn submit_bid(&self, address: &str, size: u64, price: u64) -> Result<()> {
        self.ledger.add_bid(address, size, price);
        Ok(())
    }

    async fn order_book_asks(&self) -> Result<String> {
        self.ledger.asks_ndjson()
    }

    async fn order_book_bids(&self) -> Result<String> {
        self.ledger.bids_ndjson()
    }

    async fn import_file(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to import {}: {}", path.display(), e))?;
        let content_id = hex::encode(Sha256::digest(&bytes));
        self.ledger.store_content(&content_id);
        Ok(format!("{}\n", content_id))
    }

    async fn propose_deal(&self, proposal: &DealProposal) -> Result<String> {
        self.ledger.propose(proposal)
    }

    async fn ensure_miner_identity(&self) -> Result<String> {
        let mut miner = self.miner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(address) = miner.as_ref() {
            return Ok(address.clone());
        }
        let address = format!("fcm{}", Uuid::new_v4().simple());
        self.ledger.register_miner(&address, &self.wallet);
        *miner = Some(address.clone());
        Ok(address)
    }
}

#[derive(Debug, Default)]
struct NetworkState {
    nodes: Vec<Arc<Node>>,
    connections: HashSet<(usize, usize)>,
}

/// A network whose nodes live in this process
pub struct MemoryNetwork {
    ledger: Arc<MemoryLedger>,
    repo_root: PathBuf,
    initial_balance: BigDecimal,
    block_reward: BigDecimal,
    state: Mutex<NetworkState>,
}

impl MemoryNetwork {
    pub fn new(repo_root: impl Into<PathBuf>, initial_balance: BigDecimal, block_reward: BigDecimal) -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::new()),
            repo_root: repo_root.into(),
            initial_balance,
            block_reward,
            state: Mutex::new(NetworkState::default()),
        }
    }

    pub fn ledger(&self) -> Arc<MemoryLedger> {
        self.ledger.clone()
    }

    pub fn is_connected(&self, a: usize, b: usize) -> bool {
        self.state().connections.contains(&(a.min(b), a.max(b)))
    }

    pub fn connection_count(&self) -> usize {
        self.state().connections.len()
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn matching(&self, node_type: NodeType) -> Vec<Arc<Node>> {
        self.state()
            .nodes
            .iter()
            .filter(|node| node.node_type.matches(node_type))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn add_node(&self, node_type: NodeType) -> Result<Arc<Node>> {
        let node_type = match node_type {
            NodeType::Any => *[NodeType::Miner, NodeType::Client]
                .choose(&mut rand::thread_rng())
                .unwrap_or(&NodeType::Client),
            concrete => concrete,
        };

        let wallet = format!("fcq{}", Uuid::new_v4().simple());
        let repo_path = self.repo_root.join(&wallet);
        tokio::fs::create_dir_all(&repo_path)
            .await
            .map_err(|e| anyhow!("Failed to create repo {}: {}", repo_path.display(), e))?;

        self.ledger.credit(&wallet, &self.initial_balance);
        let daemon = MemoryDaemon::new(self.ledger.clone(), wallet.clone(), self.block_reward.clone());

        let mut state = self.state();
        let node = Arc::new(Node {
            id: state.nodes.len(),
            node_type,
            wallet_address: wallet,
            repo_path,
            daemon: Arc::new(daemon),
        });
        state.nodes.push(node.clone());
        debug!(id = node.id, %node_type, "node joined");
        Ok(node)
    }

    async fn connect(&self, a: &Node, b: &Node) -> Result<()> {
        if a.id == b.id {
            return Err(anyhow!("Cannot connect node {} to itself", a.id));
        }
        self.state().connections.insert((a.id.min(b.id), a.id.max(b.id)));
        Ok(())
    }

    fn nodes(&self, node_type: NodeType) -> Vec<Arc<Node>> {
        self.matching(node_type)
    }

    fn node_counts(&self) -> HashMap<NodeType, usize> {
        let mut counts = HashMap::new();
        for node in &self.state().nodes {
            *counts.entry(node.node_type).or_insert(0) += 1;
        }
        counts
    }

    fn random_node(&self, node_type: NodeType) -> Option<Arc<Node>> {
        self.matching(node_type).choose(&mut rand::thread_rng()).cloned()
    }

    fn random_nodes(&self, node_type: NodeType, count: usize) -> Vec<Arc<Node>> {
        self.matching(node_type)
            .choose_multiple(&mut rand::thread_rng(), count)
            .cloned()
            .collect()
    }

    fn size(&self) -> usize {
        self.state().nodes.len()
    }
}
