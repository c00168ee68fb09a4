use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::models::{Ask, Bid};

#[derive(Debug, Error)]
pub enum OrderBookError {
    /// The daemon answered with no records yet
    #[error("no {0} yet")]
    Empty(&'static str),

    #[error("malformed {kind} record on line {line}: {source}")]
    Malformed {
        kind: &'static str,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse an ndjson asks listing.
///
/// A listing of one line or less counts as empty.
pub fn parse_asks(raw: &str) -> Result<Vec<Ask>, OrderBookError> {
    parse_records(raw, "asks")
}

/// Parse an ndjson bids listing, dropping bids already consumed by a deal
pub fn parse_unused_bids(raw: &str) -> Result<Vec<Bid>, OrderBookError> {
    let bids: Vec<Bid> = parse_records(raw, "bids")?;
    Ok(bids.into_iter().filter(|bid| !bid.used).collect())
}

fn parse_records<T: DeserializeOwned>(raw: &str, kind: &'static str) -> Result<Vec<T>, OrderBookError> {
    let lines: Vec<&str> = raw
        .trim_matches('\n')
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();

    debug!(kind, count = lines.len(), "parsing order book listing");

    if lines.len() <= 1 {
        return Err(OrderBookError::Empty(kind));
    }

    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| OrderBookError::Malformed {
                kind,
                line: idx + 1,
                source,
            })
        })
        .collect()
}
