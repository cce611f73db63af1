use tracing_subscriber::EnvFilter;

pub mod catalog;
pub mod collect;
pub mod config;
pub mod eda;
pub mod layout;
pub mod outcome;
pub mod preprocess;

/// Console logging for the stage binaries; `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
