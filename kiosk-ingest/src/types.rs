use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

/// Kind of assisted interaction a kiosk records alongside (or instead of) a
/// star rating. Wire codes are 0 and 1; anything else never reaches this type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InteractionType {
    Assistance,
    Emergency,
}

impl InteractionType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(InteractionType::Assistance),
            1 => Some(InteractionType::Emergency),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Assistance => "assistance",
            InteractionType::Emergency => "emergency",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kiosk event that has passed the full validation rule chain. Immutable;
/// the only way to construct one outside this crate is via
/// [`crate::validation::validate`].
///
/// Invariant: `rating == -1` implies `interaction.is_some()`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KioskEvent {
    pub exhibition_id: i32,
    pub at: NaiveDateTime,
    pub interaction: Option<InteractionType>,
    pub rating: i8,
}

/// Canonical transaction row, written once via insert-or-ignore. `value` is
/// None iff the raw rating was the -1 sentinel ("interaction occurred, no
/// rating given").
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionRecord {
    pub transaction_date: NaiveDate,
    pub transaction_time: NaiveTime,
    pub exhibition_id: i32,
    pub value: Option<i16>,
    pub interaction: Option<InteractionType>,
}

/// Normalization is total over validated events: every failure mode was
/// already rejected by the validator, so no fallible path remains here.
impl From<KioskEvent> for TransactionRecord {
    fn from(event: KioskEvent) -> Self {
        TransactionRecord {
            transaction_date: event.at.date(),
            transaction_time: event.at.time(),
            exhibition_id: event.exhibition_id,
            value: match event.rating {
                -1 => None,
                r => Some(i16::from(r)),
            },
            interaction: event.interaction,
        }
    }
}

/// Exhibition descriptor file contents, keyed the way the upstream export
/// writes them.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExhibitionDescriptor {
    #[serde(rename = "EXHIBITION_ID")]
    pub exhibition_id: String,
    #[serde(rename = "EXHIBITION_NAME")]
    pub name: String,
    #[serde(rename = "FLOOR")]
    pub floor: String,
    #[serde(rename = "DEPARTMENT")]
    pub department: String,
    #[serde(rename = "START_DATE")]
    pub start_date: Option<String>,
    #[serde(rename = "DESCRIPTION")]
    pub description: Option<String>,
}

impl ExhibitionDescriptor {
    /// Numeric exhibition id, derived from the trailing digit run of the
    /// external identifier with leading zeros stripped ("EXH_03" -> 3).
    /// The fixed-width prefix convention is an external contract; if the
    /// descriptor id scheme changes, this is the one place to touch.
    pub fn derived_id(&self) -> Option<i32> {
        let suffix = digit_suffix(&self.exhibition_id);
        if suffix.is_empty() {
            return None;
        }
        suffix.parse::<i32>().ok()
    }

    pub fn into_row(self) -> ExhibitionRow {
        let start_date = self.start_date.as_deref().and_then(parse_descriptor_date);
        ExhibitionRow {
            name: self.name,
            floor: self.floor,
            department: self.department,
            start_date,
            description: self.description,
        }
    }
}

/// The descriptor payload as persisted: the derived id is used for ordering
/// and membership checks but is not part of the stored row.
#[derive(Clone, Debug, PartialEq)]
pub struct ExhibitionRow {
    pub name: String,
    pub floor: String,
    pub department: String,
    pub start_date: Option<NaiveDate>,
    pub description: Option<String>,
}

fn digit_suffix(id: &str) -> &str {
    let boundary = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(id.len());
    &id[boundary..]
}

/// Descriptor dates arrive in a couple of shapes; anything unparseable
/// collapses to None rather than failing the file.
fn parse_descriptor_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = raw.parse::<NaiveDateTime>() {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> ExhibitionDescriptor {
        ExhibitionDescriptor {
            exhibition_id: id.to_string(),
            name: "Measureless to Man".to_string(),
            floor: "1".to_string(),
            department: "Geology".to_string(),
            start_date: Some("2021-08-23".to_string()),
            description: None,
        }
    }

    #[test]
    fn derived_id_strips_prefix_and_zero_padding() {
        assert_eq!(descriptor("EXH_03").derived_id(), Some(3));
        assert_eq!(descriptor("EXH_00").derived_id(), Some(0));
        assert_eq!(descriptor("EXH_12").derived_id(), Some(12));
    }

    #[test]
    fn derived_id_requires_a_digit_suffix() {
        assert_eq!(descriptor("EXH_").derived_id(), None);
        assert_eq!(descriptor("").derived_id(), None);
    }

    #[test]
    fn descriptor_date_parse_coerces_failures_to_none() {
        assert_eq!(
            parse_descriptor_date("2021-08-23"),
            NaiveDate::from_ymd_opt(2021, 8, 23)
        );
        assert_eq!(
            parse_descriptor_date("2021-08-23T00:00:00"),
            NaiveDate::from_ymd_opt(2021, 8, 23)
        );
        assert_eq!(parse_descriptor_date("not a date"), None);
    }

    #[test]
    fn normalize_maps_sentinel_rating_to_null() {
        let event = KioskEvent {
            exhibition_id: 3,
            at: "2024-06-15T14:30:00".parse().unwrap(),
            interaction: Some(InteractionType::Assistance),
            rating: -1,
        };

        let record = TransactionRecord::from(event);
        assert_eq!(record.value, None);
        assert_eq!(record.interaction, Some(InteractionType::Assistance));
        assert_eq!(
            record.transaction_date,
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert_eq!(
            record.transaction_time,
            NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
    }

    #[test]
    fn normalize_passes_real_ratings_through() {
        let event = KioskEvent {
            exhibition_id: 1,
            at: "2024-06-15T09:00:00".parse().unwrap(),
            interaction: None,
            rating: 4,
        };

        let record = TransactionRecord::from(event);
        assert_eq!(record.value, Some(4));
        assert_eq!(record.interaction, None);
    }

    #[test]
    fn interaction_codes_map_to_names() {
        assert_eq!(
            InteractionType::from_code(0),
            Some(InteractionType::Assistance)
        );
        assert_eq!(
            InteractionType::from_code(1),
            Some(InteractionType::Emergency)
        );
        assert_eq!(InteractionType::from_code(2), None);
        assert_eq!(InteractionType::Assistance.to_string(), "assistance");
        assert_eq!(InteractionType::Emergency.to_string(), "emergency");
    }
}
