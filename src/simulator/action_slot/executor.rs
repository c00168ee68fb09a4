use anyhow::anyhow;
use bigdecimal::BigDecimal;
use rand::Rng;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::models::{Action, ActionError, ActionResult};
use crate::simulator::config::SimulationConfig;
use crate::simulator::network::{Network, Node, NodeType};
use crate::simulator::order_book::{match_deal, parse_asks, parse_unused_bids, DealProposal};
use crate::simulator::shared::TestFileSource;

/// Amount moved by a payment action
pub const PAYMENT_AMOUNT: u64 = 5000;

/// Pseudo sizes (~MB) used by asks and bids
pub const ORDER_SIZE: RangeInclusive<u64> = 31..=46;
pub const ASK_PRICE: RangeInclusive<u64> = 13..=25;
pub const BID_PRICE: RangeInclusive<u64> = 1..=17;

/// Runs single randomized actions against nodes drawn from the network
#[derive(Clone)]
pub struct ActionExecutor {
    network: Arc<dyn Network>,
    files: Arc<dyn TestFileSource>,
    test_files_dir: Option<PathBuf>,
    transfer_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(network: Arc<dyn Network>, files: Arc<dyn TestFileSource>, config: &SimulationConfig) -> Self {
        Self {
            network,
            files,
            test_files_dir: config.test_files_dir.clone(),
            // a transfer still pending after three blocks is hung
            transfer_timeout: config.block_time * 3,
        }
    }

    pub async fn execute(&self, action: Action) -> ActionResult {
        match action {
            Action::Payment => self.payment().await,
            Action::Ask => self.ask().await,
            Action::Bid => self.bid().await,
            Action::Deal => self.deal().await,
        }
    }

    pub async fn payment(&self) -> ActionResult {
        let nodes = self.network.random_nodes(NodeType::Any, 2);
        if nodes.len() < 2 {
            return Err(ActionError::NotEnoughNodes { needed: 2, found: nodes.len() });
        }
        let (sender, receiver) = (&nodes[0], &nodes[1]);

        info!(from = sender.id, to = receiver.id, "trying to send payment");
        let from = wallet_or_empty(sender).await;
        let to = wallet_or_empty(receiver).await;
        if from.is_empty() || to.is_empty() {
            return Err(ActionError::MissingAddress { from, to });
        }

        let amount = BigDecimal::from(PAYMENT_AMOUNT);
        let balance = sender
            .daemon
            .wallet_balance(&from)
            .await
            .map_err(|e| ActionError::daemon("wallet balance", e))?;
        if balance < amount {
            return Err(ActionError::InsufficientBalance {
                address: from,
                balance: balance.to_string(),
            });
        }

        match tokio::time::timeout(self.transfer_timeout, sender.daemon.transfer(&from, &to, &amount)).await {
            Err(_) => Err(ActionError::Timeout(self.transfer_timeout)),
            Ok(Err(e)) => Err(ActionError::daemon("transfer", e)),
            Ok(Ok(())) => Ok(format!("sent {} from {} to {}", amount, from, to)),
        }
    }

    pub async fn ask(&self) -> ActionResult {
        let (size, price) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(ORDER_SIZE), rng.gen_range(ASK_PRICE))
        };

        let node = self
            .network
            .random_node(NodeType::Miner)
            .ok_or(ActionError::NoNode(NodeType::Miner))?;

        let miner = node
            .daemon
            .ensure_miner_identity()
            .await
            .map_err(|e| ActionError::daemon("miner identity", e))?;

        info!(%miner, size, price, "adding ask");
        node.daemon
            .submit_ask(&miner, size, price)
            .await
            .map_err(|e| ActionError::daemon("submit ask", e))?;

        Ok(format!("ask from {}: size {} price {}", miner, size, price))
    }

    pub async fn bid(&self) -> ActionResult {
        let (size, price) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(ORDER_SIZE), rng.gen_range(BID_PRICE))
        };

        let node = self
            .network
            .random_node(NodeType::Client)
            .ok_or(ActionError::NoNode(NodeType::Client))?;

        let from = node
            .daemon
            .main_wallet_address()
            .await
            .map_err(|e| ActionError::daemon("wallet address", e))?;

        info!(%from, size, price, "adding bid");
        node.daemon
            .submit_bid(&from, size, price)
            .await
            .map_err(|e| ActionError::daemon("submit bid", e))?;

        Ok(format!("bid from {}: size {} price {}", from, size, price))
    }

    pub async fn deal(&self) -> ActionResult {
        let node = self
            .network
            .random_node(NodeType::Client)
            .ok_or(ActionError::NoNode(NodeType::Client))?;

        let raw = node
            .daemon
            .order_book_asks()
            .await
            .map_err(|e| ActionError::daemon("order book asks", e))?;
        let asks = parse_asks(&raw)?;

        let raw = node
            .daemon
            .order_book_bids()
            .await
            .map_err(|e| ActionError::daemon("order book bids", e))?;
        let bids = parse_unused_bids(&raw)?;

        let (ask, bid) = match_deal(&asks, &bids, &node.wallet_address)?;
        info!(
            wallet = %node.wallet_address,
            ask = ask.id,
            ask_price = %ask.price,
            bid = bid.id,
            bid_price = %bid.price,
            "deal found ask and bid"
        );

        let source_dir = self
            .test_files_dir
            .as_deref()
            .ok_or_else(|| ActionError::TestFile(anyhow!("no test files directory configured")))?;
        let file = self
            .files
            .pick_random_file(source_dir, &node.repo_path)
            .await
            .map_err(ActionError::TestFile)?;

        let content_id = node
            .daemon
            .import_file(&file)
            .await
            .map_err(|e| ActionError::daemon("import file", e))?
            .trim()
            .to_string();

        let proposal = DealProposal {
            ask_id: ask.id,
            bid_id: bid.id,
            content_id,
        };
        let response = node
            .daemon
            .propose_deal(&proposal)
            .await
            .map_err(|e| ActionError::daemon("propose deal", e))?;

        Ok(format!("deal proposal: {}", response.trim()))
    }
}

async fn wallet_or_empty(node: &Node) -> String {
    match node.daemon.main_wallet_address().await {
        Ok(address) => address,
        Err(e) => {
            warn!(node = node.id, error = %e, "could not get wallet address");
            String::new()
        }
    }
}
