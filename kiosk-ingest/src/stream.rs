use tracing::{info, warn};

use crate::catalog::{CatalogSource, ExhibitionCatalog};
use crate::errors::PipelineError;
use crate::kafka::{KioskEventConsumer, RecvErr};
use crate::metrics_consts::{
    EMPTY_EVENTS, EVENTS_RECEIVED, EVENTS_REJECTED, EVENT_PARSE_ERROR, TRANSACTIONS_INGESTED,
};
use crate::sink::RecordSink;
use crate::types::TransactionRecord;
use crate::validation::validate;

/// Drives the live path: one event at a time, validated, normalized and
/// persisted before its offset is stored. The catalog is re-derived from the
/// descriptor files per event, so membership tracks the directory as it is
/// now rather than as it was at startup. Rejections and poison pills are
/// logged and skipped; Kafka transport faults, descriptor directory read
/// failures and exhausted database retries abort the loop so the process
/// restarts with clean connections.
pub async fn run_stream_ingest(
    consumer: KioskEventConsumer,
    catalog: &CatalogSource,
    sink: &dyn RecordSink,
) -> Result<(), PipelineError> {
    loop {
        let (payload, offset) = match consumer.recv_payload().await {
            Ok(received) => received,
            Err(RecvErr::Empty) => {
                metrics::counter!(EMPTY_EVENTS).increment(1);
                warn!("received empty event payload, skipping");
                continue;
            }
            Err(RecvErr::Serde(e)) => {
                metrics::counter!(EVENT_PARSE_ERROR).increment(1);
                warn!(error = %e, "received unparseable event payload, skipping");
                continue;
            }
            Err(RecvErr::Kafka(e)) => return Err(e.into()),
        };
        metrics::counter!(EVENTS_RECEIVED).increment(1);

        let catalog = catalog.snapshot()?;
        let event = match validate(&payload, &catalog) {
            Ok(event) => event,
            Err(reason) => {
                metrics::counter!(EVENTS_REJECTED, &[("reason", reason.label())]).increment(1);
                warn!(%reason, %payload, "rejected event");
                offset.store()?;
                continue;
            }
        };

        sink.upsert_transaction(TransactionRecord::from(event)).await?;
        offset.store()?;
        metrics::counter!(TRANSACTIONS_INGESTED).increment(1);
    }
}

/// Logs a one-line summary of what the consumer is about to read. Called once
/// at startup so operators can confirm topic and catalog wiring at a glance.
pub fn log_startup(topic: &str, catalog: &ExhibitionCatalog) {
    info!(
        topic,
        exhibitions = catalog.len(),
        valid_ids = ?catalog.valid_ids(),
        "starting stream ingest"
    );
}
