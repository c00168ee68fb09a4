// Public library interface for filnet-sim
pub mod simulator;
