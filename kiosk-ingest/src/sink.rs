use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::metrics_consts::{UPSERT_BATCH_ATTEMPT, UPSERT_ROWS_AFFECTED};
use crate::types::{ExhibitionRow, TransactionRecord};

const UPSERT_MAX_RETRY_ATTEMPTS: u64 = 3;
const UPSERT_RETRY_DELAY_MS: u64 = 50;

/// Idempotent persistence of normalized records. Inserts conflict-ignore on
/// the store's natural keys, so redelivery and reprocessing converge to the
/// same final state, and a single-record call is equivalent to a batch of one.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn upsert_transaction(&self, record: TransactionRecord) -> Result<(), PipelineError>;
    async fn upsert_transactions(
        &self,
        records: Vec<TransactionRecord>,
    ) -> Result<(), PipelineError>;
    async fn upsert_exhibition(&self, row: ExhibitionRow) -> Result<(), PipelineError>;
    async fn upsert_exhibitions(&self, rows: Vec<ExhibitionRow>) -> Result<(), PipelineError>;
}

pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Marks one failed attempt: returns the backoff delay while retry
    /// budget remains, or None once the attempt budget is spent.
    fn retry_delay(table: &'static str, tries: u64, e: &sqlx::Error) -> Option<Duration> {
        if tries >= UPSERT_MAX_RETRY_ATTEMPTS {
            metrics::counter!(UPSERT_BATCH_ATTEMPT, &[("table", table), ("result", "failed")])
                .increment(1);
            return None;
        }
        metrics::counter!(UPSERT_BATCH_ATTEMPT, &[("table", table), ("result", "retry")])
            .increment(1);
        let jitter = rand::random::<u64>() % 50;
        let delay = tries * UPSERT_RETRY_DELAY_MS + jitter;
        warn!(table, error = %e, "upsert failed, retrying in {delay}ms");
        Some(Duration::from_millis(delay))
    }

    fn record_success(table: &'static str, rows: u64) {
        metrics::counter!(UPSERT_BATCH_ATTEMPT, &[("table", table), ("result", "success")])
            .increment(1);
        metrics::counter!(UPSERT_ROWS_AFFECTED, &[("table", table)]).increment(rows);
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn upsert_transaction(&self, record: TransactionRecord) -> Result<(), PipelineError> {
        self.upsert_transactions(vec![record]).await
    }

    async fn upsert_transactions(
        &self,
        records: Vec<TransactionRecord>,
    ) -> Result<(), PipelineError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut dates: Vec<NaiveDate> = Vec::with_capacity(records.len());
        let mut times: Vec<NaiveTime> = Vec::with_capacity(records.len());
        let mut exhibition_ids: Vec<i32> = Vec::with_capacity(records.len());
        let mut values: Vec<Option<i16>> = Vec::with_capacity(records.len());
        let mut interactions: Vec<Option<String>> = Vec::with_capacity(records.len());
        for record in records {
            dates.push(record.transaction_date);
            times.push(record.transaction_time);
            exhibition_ids.push(record.exhibition_id);
            values.push(record.value);
            interactions.push(record.interaction.map(|i| i.as_str().to_string()));
        }

        let mut tries: u64 = 1;
        loop {
            // One statement, one transaction: the batch lands atomically or
            // not at all, and a conflict on the natural key is a no-op
            // rather than an error.
            let result = sqlx::query(
                r#"
                INSERT INTO kiosk_transaction (transaction_date, transaction_time, exhibition_id, value, type)
                    (SELECT * FROM UNNEST(
                        $1::date[],
                        $2::time[],
                        $3::int[],
                        $4::smallint[],
                        $5::varchar[])) ON CONFLICT DO NOTHING"#,
            )
            .bind(&dates)
            .bind(&times)
            .bind(&exhibition_ids)
            .bind(&values)
            .bind(&interactions)
            .execute(&self.pool)
            .await;

            match result {
                Ok(pg_result) => {
                    Self::record_success("kiosk_transaction", pg_result.rows_affected());
                    return Ok(());
                }
                Err(e) => match Self::retry_delay("kiosk_transaction", tries, &e) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        tries += 1;
                    }
                    None => return Err(e.into()),
                },
            }
        }
    }

    async fn upsert_exhibition(&self, row: ExhibitionRow) -> Result<(), PipelineError> {
        self.upsert_exhibitions(vec![row]).await
    }

    async fn upsert_exhibitions(&self, rows: Vec<ExhibitionRow>) -> Result<(), PipelineError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut names: Vec<String> = Vec::with_capacity(rows.len());
        let mut floors: Vec<String> = Vec::with_capacity(rows.len());
        let mut departments: Vec<String> = Vec::with_capacity(rows.len());
        let mut start_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(rows.len());
        let mut descriptions: Vec<Option<String>> = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.name);
            floors.push(row.floor);
            departments.push(row.department);
            start_dates.push(row.start_date);
            descriptions.push(row.description);
        }

        let mut tries: u64 = 1;
        loop {
            let result = sqlx::query(
                r#"
                INSERT INTO exhibition (name, floor, department, start_date, description)
                    (SELECT * FROM UNNEST(
                        $1::varchar[],
                        $2::varchar[],
                        $3::varchar[],
                        $4::date[],
                        $5::text[])) ON CONFLICT DO NOTHING"#,
            )
            .bind(&names)
            .bind(&floors)
            .bind(&departments)
            .bind(&start_dates)
            .bind(&descriptions)
            .execute(&self.pool)
            .await;

            match result {
                Ok(pg_result) => {
                    Self::record_success("exhibition", pg_result.rows_affected());
                    return Ok(());
                }
                Err(e) => match Self::retry_delay("exhibition", tries, &e) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        tries += 1;
                    }
                    None => return Err(e.into()),
                },
            }
        }
    }
}

/// Logs records instead of writing them. Local development stand-in.
pub struct PrintSink;

#[async_trait]
impl RecordSink for PrintSink {
    async fn upsert_transaction(&self, record: TransactionRecord) -> Result<(), PipelineError> {
        info!("transaction: {:?}", record);
        Ok(())
    }

    async fn upsert_transactions(
        &self,
        records: Vec<TransactionRecord>,
    ) -> Result<(), PipelineError> {
        info!("batch of {} transactions", records.len());
        for record in records {
            info!("transaction: {:?}", record);
        }
        Ok(())
    }

    async fn upsert_exhibition(&self, row: ExhibitionRow) -> Result<(), PipelineError> {
        info!("exhibition: {:?}", row);
        Ok(())
    }

    async fn upsert_exhibitions(&self, rows: Vec<ExhibitionRow>) -> Result<(), PipelineError> {
        info!("batch of {} exhibitions", rows.len());
        for row in rows {
            info!("exhibition: {:?}", row);
        }
        Ok(())
    }
}

/// Collects upserts in memory for adapter tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub transactions: std::sync::Mutex<Vec<TransactionRecord>>,
    pub exhibitions: std::sync::Mutex<Vec<ExhibitionRow>>,
}

#[cfg(test)]
#[async_trait]
impl RecordSink for MemorySink {
    async fn upsert_transaction(&self, record: TransactionRecord) -> Result<(), PipelineError> {
        self.transactions.lock().unwrap().push(record);
        Ok(())
    }

    async fn upsert_transactions(
        &self,
        records: Vec<TransactionRecord>,
    ) -> Result<(), PipelineError> {
        self.transactions.lock().unwrap().extend(records);
        Ok(())
    }

    async fn upsert_exhibition(&self, row: ExhibitionRow) -> Result<(), PipelineError> {
        self.exhibitions.lock().unwrap().push(row);
        Ok(())
    }

    async fn upsert_exhibitions(&self, rows: Vec<ExhibitionRow>) -> Result<(), PipelineError> {
        self.exhibitions.lock().unwrap().extend(rows);
        Ok(())
    }
}
