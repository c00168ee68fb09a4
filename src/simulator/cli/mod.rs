pub mod reporter;

pub use reporter::{ActionTally, SimulationReporter, SimulationStats};
