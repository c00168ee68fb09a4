pub mod matcher;
pub mod models;
pub mod parser;

pub use matcher::{match_deal, MatchError};
pub use models::{Ask, Bid, DealProposal};
pub use parser::{parse_asks, parse_unused_bids, OrderBookError};
