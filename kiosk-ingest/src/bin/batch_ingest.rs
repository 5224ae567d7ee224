use std::path::Path;

use anyhow::Context;
use regex::Regex;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use kiosk_ingest::batch::{ingest_exhibitions, ingest_transactions};
use kiosk_ingest::catalog::ExhibitionCatalog;
use kiosk_ingest::config::Config;
use kiosk_ingest::ledger::AppendLogLedger;
use kiosk_ingest::setup_tracing;
use kiosk_ingest::sink::PostgresSink;

/// One-shot batch run: new exhibition descriptors first, then the combined
/// transaction table. Safe to re-run; already-processed descriptor files are
/// skipped via the ledger and transaction inserts conflict-ignore.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing();

    let config = Config::init_with_defaults().context("loading configuration")?;

    let pattern =
        Regex::new(&config.exhibition_file_pattern).context("compiling descriptor file pattern")?;
    let ledger = AppendLogLedger::open(&config.processed_files_path)
        .context("opening processed files ledger")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_pg_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to postgres")?;
    let sink = PostgresSink::new(pool);

    let data_dir = Path::new(&config.data_dir);
    let exhibitions = ingest_exhibitions(data_dir, &pattern, &ledger, &sink)
        .await
        .context("ingesting exhibition descriptors")?;

    let catalog = ExhibitionCatalog::load(data_dir, &pattern)
        .context("loading exhibition catalog")?;
    let transactions = ingest_transactions(
        Path::new(&config.combined_data_path),
        &catalog,
        &sink,
    )
    .await
    .context("ingesting combined transaction data")?;

    info!(exhibitions, transactions, "batch run complete");
    Ok(())
}
