use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::action_slot::Action;

/// Configuration for the entire simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Nodes created before the churn loop starts
    pub start_nodes: usize,

    /// Population cap for the churn loop
    pub max_nodes: usize,

    /// Maximum miners drawn per mining epoch
    pub fork_branching: usize,

    /// Probability that a drawn miner mines in an epoch
    pub fork_probability: f64,

    /// Delay between node joins
    #[serde(rename = "join_time_ms", with = "duration_ms")]
    pub join_time: Duration,

    /// Delay between mining epochs
    #[serde(rename = "block_time_ms", with = "duration_ms")]
    pub block_time: Duration,

    /// Delay between random actions
    #[serde(rename = "action_time_ms", with = "duration_ms")]
    pub action_time: Duration,

    /// Directory deal actions pick their payload from
    pub test_files_dir: Option<PathBuf>,

    /// Which actions are enabled
    pub actions: ActionToggles,
}

/// Per-action switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionToggles {
    pub ask: bool,
    pub bid: bool,
    pub deal: bool,
    pub payment: bool,
    pub mine: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("fork probability must be within [0, 1], got {0}")]
    ForkProbability(f64),

    #[error("start nodes ({start}) exceeds max nodes ({max})")]
    StartExceedsMax { start: usize, max: usize },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("mining is enabled but fork branching is zero")]
    ZeroForkBranching,

    #[error("deal action is enabled but no test files directory is configured")]
    MissingTestFilesDir,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_nodes: 5,
            max_nodes: 30,
            fork_branching: 1,
            fork_probability: 1.0,
            join_time: Duration::from_secs(3),
            block_time: Duration::from_secs(2),
            action_time: Duration::from_millis(1000),
            test_files_dir: None,
            actions: ActionToggles {
                ask: true,
                bid: true,
                deal: false,
                payment: true,
                mine: true,
            },
        }
    }
}

impl SimulationConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json_string = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        serde_json::from_str(&json_string).map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))
    }

    /// Check the preconditions the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.fork_probability) {
            return Err(ConfigError::ForkProbability(self.fork_probability));
        }
        if self.start_nodes > self.max_nodes {
            return Err(ConfigError::StartExceedsMax {
                start: self.start_nodes,
                max: self.max_nodes,
            });
        }
        for (name, interval) in [
            ("join time", self.join_time),
            ("block time", self.block_time),
            ("action time", self.action_time),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if self.actions.mine && self.fork_branching == 0 {
            return Err(ConfigError::ZeroForkBranching);
        }
        if self.actions.deal && self.test_files_dir.is_none() {
            return Err(ConfigError::MissingTestFilesDir);
        }
        Ok(())
    }

    /// Actions the action scheduler draws from, in a fixed order
    pub fn enabled_actions(&self) -> Vec<Action> {
        let toggles = self.actions;
        [
            (toggles.ask, Action::Ask),
            (toggles.bid, Action::Bid),
            (toggles.deal, Action::Deal),
            (toggles.payment, Action::Payment),
        ]
        .into_iter()
        .filter_map(|(enabled, action)| enabled.then_some(action))
        .collect()
    }
}

impl fmt::Display for SimulationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "StartNodes: {}", self.start_nodes)?;
        writeln!(f, "MaxNodes: {}", self.max_nodes)?;
        writeln!(f, "ForkBranching: {}", self.fork_branching)?;
        writeln!(f, "ForkProbability: {}", self.fork_probability)?;
        writeln!(f, "JoinTime: {:?}", self.join_time)?;
        writeln!(f, "BlockTime: {:?}", self.block_time)?;
        writeln!(f, "ActionTime: {:?}", self.action_time)?;
        match &self.test_files_dir {
            Some(dir) => writeln!(f, "TestfilesDir: {}", dir.display())?,
            None => writeln!(f, "TestfilesDir: -")?,
        }
        writeln!(f, "Actions:")?;
        write!(f, "{}", self.actions)
    }
}

impl fmt::Display for ActionToggles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\tAsk: {}", self.ask)?;
        writeln!(f, "\tBid: {}", self.bid)?;
        writeln!(f, "\tDeal: {}", self.deal)?;
        writeln!(f, "\tPayment: {}", self.payment)?;
        writeln!(f, "\tMine: {}", self.mine)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
