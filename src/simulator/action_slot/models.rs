use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::simulator::network::NodeType;
use crate::simulator::order_book::{MatchError, OrderBookError};

/// Randomized economic action the scheduler can dispatch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    /// Transfer funds between two random nodes
    Payment,
    /// A miner offers storage
    Ask,
    /// A client requests storage
    Bid,
    /// A client matches one of its bids against the order book
    Deal,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Payment, Action::Ask, Action::Bid, Action::Deal];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Payment => write!(f, "payment"),
            Action::Ask => write!(f, "ask"),
            Action::Bid => write!(f, "bid"),
            Action::Deal => write!(f, "deal"),
        }
    }
}

/// Why a single action attempt was abandoned
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("not enough nodes for random actions (need {needed}, found {found})")]
    NotEnoughNodes { needed: usize, found: usize },

    #[error("no {0} node available")]
    NoNode(NodeType),

    #[error("could not get wallet addresses ({from:?}, {to:?})")]
    MissingAddress { from: String, to: String },

    #[error("not enough money in address {address}: {balance}")]
    InsufficientBalance { address: String, balance: String },

    #[error(transparent)]
    EmptyOrderBook(OrderBookError),

    #[error(transparent)]
    MalformedOrderBook(OrderBookError),

    #[error(transparent)]
    NoDeal(#[from] MatchError),

    #[error("could not pick a test file: {0:#}")]
    TestFile(anyhow::Error),

    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("{call} failed: {source:#}")]
    Daemon {
        call: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ActionError {
    pub fn daemon(call: &'static str, source: anyhow::Error) -> Self {
        Self::Daemon { call, source }
    }

    /// Whether the attempt was skipped because its preconditions did not
    /// hold, as opposed to failing part way through
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ActionError::NotEnoughNodes { .. }
                | ActionError::NoNode(_)
                | ActionError::InsufficientBalance { .. }
                | ActionError::EmptyOrderBook(_)
                | ActionError::NoDeal(_)
        )
    }
}

impl From<OrderBookError> for ActionError {
    fn from(err: OrderBookError) -> Self {
        match err {
            OrderBookError::Empty(_) => ActionError::EmptyOrderBook(err),
            OrderBookError::Malformed { .. } => ActionError::MalformedOrderBook(err),
        }
    }
}

/// Result of one action attempt; `Ok` carries a short description of what was done
pub type ActionResult = Result<String, ActionError>;
