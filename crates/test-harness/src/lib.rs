//! Scenario-driving helpers for end-to-end tests: a fluent model builder
//! over a [`feature_engine::Document`] plus the in-process boolean kernel.

pub mod builder;

pub use builder::{HarnessError, ModelBuilder};

/// Install a test-friendly tracing subscriber once per process. Safe to
/// call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
