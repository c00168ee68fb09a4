use thiserror::Error;
use tracing::debug;

use super::models::{Ask, Bid};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("no bids for wallet {0}")]
    NoBidsForWallet(String),

    #[error("no matching ask/bid for wallet {0}")]
    NoMatch(String),
}

/// Pick the first compatible ask/bid pair for `wallet`.
///
/// The wallet's bids are tried oldest first (ascending id) and, for each bid,
/// asks are scanned cheapest first. The first ask the bid fits in wins, so the
/// result is first-fit rather than globally optimal. Both sorts are stable,
/// which keeps the result deterministic for identical inputs.
pub fn match_deal(asks: &[Ask], bids: &[Bid], wallet: &str) -> Result<(Ask, Bid), MatchError> {
    let mut bids: Vec<&Bid> = bids.iter().collect();
    bids.sort_by_key(|bid| bid.id);

    let mut asks: Vec<&Ask> = asks.iter().collect();
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    let wallet_bids: Vec<&Bid> = bids.into_iter().filter(|bid| bid.owner == wallet).collect();
    if wallet_bids.is_empty() {
        return Err(MatchError::NoBidsForWallet(wallet.to_string()));
    }

    for bid in wallet_bids {
        debug!(wallet, bid = bid.id, price = %bid.price, size = %bid.size, "considering bid");
        if let Some(ask) = asks.iter().find(|ask| bid.fits(ask)) {
            return Ok(((*ask).clone(), bid.clone()));
        }
    }

    Err(MatchError::NoMatch(wallet.to_string()))
}
