pub mod batch;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod kafka;
pub mod ledger;
pub mod metrics_consts;
pub mod sink;
pub mod stream;
pub mod types;
pub mod validation;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}
