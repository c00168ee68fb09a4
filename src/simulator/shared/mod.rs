pub mod events;
pub mod periodic;
pub mod test_files;
#[cfg(test)]
pub mod test_support;

pub use events::{EventSink, SimEvent};
pub use periodic::periodic;
pub use test_files::{DirectoryFiles, TestFileSource};
