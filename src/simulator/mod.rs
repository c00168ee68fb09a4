pub mod action_slot;
pub mod churn;
pub mod cli;
pub mod config;
pub mod engine;
pub mod mining;
pub mod network;
pub mod order_book;
pub mod shared;

pub use config::{ActionToggles, ConfigError, SimulationConfig};
pub use engine::{EngineHandle, SimulationEngine};
