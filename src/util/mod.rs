//! General utility code
// (c) 2025 Ross Younger

mod tracing;

pub use tracing::setup_tracing;
