pub mod executor;
pub mod models;
pub mod scheduler;

pub use executor::ActionExecutor;
pub use models::{Action, ActionError, ActionResult};
pub use scheduler::ActionScheduler;
