use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use regex::Regex;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use kiosk_ingest::catalog::CatalogSource;
use kiosk_ingest::config::Config;
use kiosk_ingest::kafka::KioskEventConsumer;
use kiosk_ingest::setup_tracing;
use kiosk_ingest::sink::{PostgresSink, PrintSink, RecordSink};
use kiosk_ingest::stream::{log_startup, run_stream_ingest};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing();

    let config = Config::init_with_defaults().context("loading configuration")?;

    let pattern =
        Regex::new(&config.exhibition_file_pattern).context("compiling descriptor file pattern")?;
    let catalog_source = CatalogSource::new(Path::new(&config.data_dir), pattern);
    let catalog = catalog_source
        .snapshot()
        .context("loading exhibition catalog")?;
    if catalog.is_empty() {
        warn!(
            data_dir = %config.data_dir,
            "no exhibition descriptors found, every event will be rejected"
        );
    }

    let sink: Arc<dyn RecordSink> = if config.print_sink {
        warn!("print sink enabled, no records will be persisted");
        Arc::new(PrintSink)
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_pg_connections)
            .connect(&config.database_url)
            .await
            .context("connecting to postgres")?;
        Arc::new(PostgresSink::new(pool))
    };

    let consumer = KioskEventConsumer::new(&config.kafka, &config.consumer)
        .context("creating kafka consumer")?;
    log_startup(&config.consumer.kafka_consumer_topic, &catalog);

    tokio::select! {
        result = run_stream_ingest(consumer, &catalog_source, sink.as_ref()) => {
            result.context("stream ingest failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, exiting");
        }
    }
    Ok(())
}
