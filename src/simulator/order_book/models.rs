use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// A miner's offer to store data at a price and capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ask {
    pub id: u64,

    pub price: BigDecimal,

    pub size: BigDecimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// A client's request to store data at a price and capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: u64,

    pub price: BigDecimal,

    pub size: BigDecimal,

    pub owner: String,

    /// Set once the bid has been consumed by a deal
    #[serde(default)]
    pub used: bool,
}

/// A deal proposal pairing one ask with one bid over imported content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealProposal {
    pub ask_id: u64,
    pub bid_id: u64,
    pub content_id: String,
}

impl Bid {
    /// Whether this bid fits within the ask's capacity at or above its price
    pub fn fits(&self, ask: &Ask) -> bool {
        self.size <= ask.size && self.price >= ask.price
    }
}
