pub const EVENTS_RECEIVED: &str = "kiosk_events_received";
pub const EVENTS_REJECTED: &str = "kiosk_events_rejected";
pub const EVENT_PARSE_ERROR: &str = "kiosk_event_parse_error";
pub const EMPTY_EVENTS: &str = "kiosk_empty_events";
pub const TRANSACTIONS_INGESTED: &str = "kiosk_transactions_ingested";
pub const EXHIBITIONS_INGESTED: &str = "kiosk_exhibitions_ingested";
pub const FILES_SKIPPED_PROCESSED: &str = "kiosk_files_skipped_already_processed";
pub const BATCH_ROWS_REJECTED: &str = "kiosk_batch_rows_rejected";
pub const UPSERT_BATCH_ATTEMPT: &str = "kiosk_upsert_batch_attempt";
pub const UPSERT_ROWS_AFFECTED: &str = "kiosk_upsert_rows_affected";
