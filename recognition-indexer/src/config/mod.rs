//! Configuration and dependency wiring for the recognition indexer.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{ConnectionMode, Settings};
