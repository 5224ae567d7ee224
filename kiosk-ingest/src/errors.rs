use chrono::NaiveTime;
use thiserror::Error;

use crate::kafka::OffsetErr;

/// Faults that abort the current unit of work: one event on the stream path,
/// one batch on the batch path. Per-event rejections are [`RejectionReason`]
/// instead and never surface through this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("consumer offset error: {0}")]
    Offset(#[from] OffsetErr),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Why a raw event was rejected by the validation rule chain. The variants
/// are ordered to match the chain; the first failing rule wins, so the reason
/// reported for a multi-fault payload is deterministic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required key: {0}")]
    MissingKey(&'static str),
    #[error("unexpected key in payload: {0}")]
    UnexpectedKey(String),
    #[error("unknown exhibition id: {0}")]
    UnknownExhibition(String),
    #[error("unparseable timestamp: {0}")]
    BadTimestamp(String),
    #[error("timestamp outside operating window: {0}")]
    OutsideOperatingWindow(NaiveTime),
    #[error("invalid interaction type: {0}")]
    InvalidInteractionType(String),
    #[error("invalid rating value: {0}")]
    InvalidRating(String),
    #[error("type must be present when value is -1")]
    SentinelWithoutType,
}

impl RejectionReason {
    /// Stable low-cardinality label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::NotAnObject => "not_an_object",
            RejectionReason::MissingKey(_) => "missing_key",
            RejectionReason::UnexpectedKey(_) => "unexpected_key",
            RejectionReason::UnknownExhibition(_) => "unknown_exhibition",
            RejectionReason::BadTimestamp(_) => "bad_timestamp",
            RejectionReason::OutsideOperatingWindow(_) => "outside_operating_window",
            RejectionReason::InvalidInteractionType(_) => "invalid_interaction_type",
            RejectionReason::InvalidRating(_) => "invalid_rating",
            RejectionReason::SentinelWithoutType => "sentinel_without_type",
        }
    }
}
