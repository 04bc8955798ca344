//! Utilities for testing code built on the script host.

mod recording;

pub use recording::*;

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a test-friendly tracing subscriber.
///
/// `RUST_LOG` takes precedence; without it, logging stays off. Calling it more than once is
/// harmless.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("off")
    };
    let _ = fmt().with_env_filter(filter).with_target(true).with_test_writer().try_init();
}
