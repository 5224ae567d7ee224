use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::catalog::ExhibitionCatalog;
use crate::errors::RejectionReason;
use crate::types::{InteractionType, KioskEvent};

pub const ALLOWED_KEYS: [&str; 4] = ["site", "at", "type", "val"];

// The museum's extended operating window, inclusive at both ends.
static WINDOW_OPEN: LazyLock<NaiveTime> =
    LazyLock::new(|| NaiveTime::from_hms_opt(8, 45, 0).unwrap());
static WINDOW_CLOSE: LazyLock<NaiveTime> =
    LazyLock::new(|| NaiveTime::from_hms_opt(18, 15, 0).unwrap());

/// Applies the full rule chain to one raw payload. Rules run in a fixed
/// order and short-circuit on the first failure, so the reported reason for
/// a multi-fault payload is deterministic: completeness, shape, exhibition
/// membership, operating window, type domain, value domain, and finally the
/// sentinel cross-field check.
pub fn validate(
    payload: &Value,
    catalog: &ExhibitionCatalog,
) -> Result<KioskEvent, RejectionReason> {
    let Some(object) = payload.as_object() else {
        return Err(RejectionReason::NotAnObject);
    };

    // Completeness: site, at and val are required; type is optional.
    for key in ["site", "at", "val"] {
        match object.get(key) {
            None | Some(Value::Null) => return Err(RejectionReason::MissingKey(key)),
            Some(_) => {}
        }
    }

    // Shape: nothing beyond the established keys.
    for key in object.keys() {
        if !ALLOWED_KEYS.contains(&key.trim()) {
            return Err(RejectionReason::UnexpectedKey(key.clone()));
        }
    }

    // Exhibition membership: an unknown or retired exhibition would become a
    // dangling reference, so it is rejected rather than persisted.
    let site = &object["site"];
    let exhibition_id = catalog
        .resolve(site)
        .ok_or_else(|| RejectionReason::UnknownExhibition(display_value(site)))?;

    // Operating window, time-of-day only; the date is not restricted.
    let at = parse_timestamp(&object["at"])?;
    let time = at.time();
    if time < *WINDOW_OPEN || time > *WINDOW_CLOSE {
        return Err(RejectionReason::OutsideOperatingWindow(time));
    }

    // Type domain: if present, the code must stringify to "0" or "1".
    let interaction = match object.get("type") {
        None | Some(Value::Null) => None,
        Some(raw) => {
            let code = stringify_type(raw);
            match code.as_str() {
                "0" => Some(InteractionType::Assistance),
                "1" => Some(InteractionType::Emergency),
                _ => return Err(RejectionReason::InvalidInteractionType(code)),
            }
        }
    };

    // Value domain.
    let raw_val = &object["val"];
    let rating = raw_val
        .as_i64()
        .filter(|v| (-1..=4).contains(v))
        .ok_or_else(|| RejectionReason::InvalidRating(display_value(raw_val)))?;

    // Sentinel cross-field rule: an interaction without a rating must still
    // declare what kind of interaction it was.
    if rating == -1 && interaction.is_none() {
        return Err(RejectionReason::SentinelWithoutType);
    }

    Ok(KioskEvent {
        exhibition_id,
        at,
        interaction,
        rating: rating as i8,
    })
}

fn parse_timestamp(raw: &Value) -> Result<NaiveDateTime, RejectionReason> {
    let Some(text) = raw.as_str() else {
        return Err(RejectionReason::BadTimestamp(display_value(raw)));
    };
    if let Ok(naive) = text.parse::<NaiveDateTime>() {
        return Ok(naive);
    }
    // Feed timestamps sometimes carry an offset; keep the wall-clock reading,
    // since the operating window is a local-time rule.
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Ok(with_offset.naive_local());
    }
    Err(RejectionReason::BadTimestamp(text.to_string()))
}

/// Matches the upstream check, which compared the *stringified* code: numeric
/// 0/1 pass, but a float-typed code like 0.0 renders as "0.0" and is rejected.
fn stringify_type(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionRecord;
    use chrono::NaiveDate;
    use serde_json::json;

    fn catalog() -> ExhibitionCatalog {
        let descriptors = ["EXH_00", "EXH_01", "EXH_03"].map(|id| {
            serde_json::from_value(json!({
                "EXHIBITION_ID": id,
                "EXHIBITION_NAME": format!("Exhibition {id}"),
                "FLOOR": "1",
                "DEPARTMENT": "Zoology",
                "START_DATE": "2024-01-01",
                "DESCRIPTION": null
            }))
            .unwrap()
        });
        ExhibitionCatalog::from_descriptors(descriptors)
    }

    fn event(overrides: Value) -> Value {
        let mut base = json!({
            "site": "3",
            "at": "2024-06-15T14:30:00",
            "type": 0,
            "val": 1
        });
        base.as_object_mut()
            .unwrap()
            .extend(overrides.as_object().unwrap().clone());
        base
    }

    #[test]
    fn missing_required_keys_reject_with_completeness() {
        let catalog = catalog();
        for key in ["site", "at", "val"] {
            let mut payload = event(json!({}));
            payload.as_object_mut().unwrap().remove(key);
            assert_eq!(
                validate(&payload, &catalog),
                Err(RejectionReason::MissingKey(key)),
                "removed {key}"
            );

            let mut payload = event(json!({}));
            payload
                .as_object_mut()
                .unwrap()
                .insert(key.to_string(), Value::Null);
            assert_eq!(
                validate(&payload, &catalog),
                Err(RejectionReason::MissingKey(key)),
                "nulled {key}"
            );
        }
    }

    #[test]
    fn unexpected_keys_reject_regardless_of_other_fields() {
        let payload = event(json!({ "extra": 1 }));
        assert_eq!(
            validate(&payload, &catalog()),
            Err(RejectionReason::UnexpectedKey("extra".to_string()))
        );
    }

    #[test]
    fn unknown_exhibition_rejects() {
        let payload = event(json!({ "site": "9" }));
        assert_eq!(
            validate(&payload, &catalog()),
            Err(RejectionReason::UnknownExhibition("9".to_string()))
        );
    }

    #[test]
    fn site_accepts_numbers_and_zero_padded_strings() {
        let catalog = catalog();
        assert_eq!(
            validate(&event(json!({ "site": 3 })), &catalog)
                .unwrap()
                .exhibition_id,
            3
        );
        assert_eq!(
            validate(&event(json!({ "site": "03" })), &catalog)
                .unwrap()
                .exhibition_id,
            3
        );
    }

    #[test]
    fn operating_window_boundaries_are_inclusive() {
        let catalog = catalog();
        let cases = [
            ("2024-06-15T08:44:59", false),
            ("2024-06-15T08:45:00", true),
            ("2024-06-15T18:15:00", true),
            ("2024-06-15T18:15:01", false),
        ];
        for (at, accepted) in cases {
            let result = validate(&event(json!({ "at": at })), &catalog);
            assert_eq!(result.is_ok(), accepted, "at = {at}: {result:?}");
            if !accepted {
                assert!(matches!(
                    result,
                    Err(RejectionReason::OutsideOperatingWindow(_))
                ));
            }
        }
    }

    #[test]
    fn unparseable_timestamp_rejects() {
        let payload = event(json!({ "at": "sometime yesterday" }));
        assert!(matches!(
            validate(&payload, &catalog()),
            Err(RejectionReason::BadTimestamp(_))
        ));
    }

    #[test]
    fn timestamps_with_utc_offset_are_accepted() {
        let payload = event(json!({ "at": "2024-06-15T14:30:00Z" }));
        let event = validate(&payload, &catalog()).unwrap();
        assert_eq!(
            event.at.date(),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
    }

    #[test]
    fn type_domain_accepts_codes_zero_and_one_only() {
        let catalog = catalog();
        assert_eq!(
            validate(&event(json!({ "type": "1" })), &catalog)
                .unwrap()
                .interaction,
            Some(InteractionType::Emergency)
        );
        assert!(matches!(
            validate(&event(json!({ "type": 2 })), &catalog),
            Err(RejectionReason::InvalidInteractionType(_))
        ));
        assert!(matches!(
            validate(&event(json!({ "type": 0.0 })), &catalog),
            Err(RejectionReason::InvalidInteractionType(_))
        ));
    }

    #[test]
    fn value_domain_covers_sentinel_through_four() {
        let catalog = catalog();
        for val in [-1, 0, 1, 2, 3, 4] {
            assert!(
                validate(&event(json!({ "val": val })), &catalog).is_ok(),
                "val = {val}"
            );
        }
        for val in [-2, 5, 42] {
            assert!(matches!(
                validate(&event(json!({ "val": val })), &catalog),
                Err(RejectionReason::InvalidRating(_))
            ));
        }
        assert!(matches!(
            validate(&event(json!({ "val": "three" })), &catalog),
            Err(RejectionReason::InvalidRating(_))
        ));
        assert!(matches!(
            validate(&event(json!({ "val": 2.5 })), &catalog),
            Err(RejectionReason::InvalidRating(_))
        ));
    }

    #[test]
    fn sentinel_rating_requires_an_interaction_type() {
        let catalog = catalog();
        let mut payload = event(json!({ "val": -1 }));
        payload.as_object_mut().unwrap().remove("type");
        assert_eq!(
            validate(&payload, &catalog),
            Err(RejectionReason::SentinelWithoutType)
        );

        for code in [0, 1] {
            assert!(validate(&event(json!({ "val": -1, "type": code })), &catalog).is_ok());
        }
    }

    #[test]
    fn rule_order_reports_the_first_failure() {
        // Both the shape and the value rules are violated; shape runs first.
        let payload = event(json!({ "extra": true, "val": 99 }));
        assert!(matches!(
            validate(&payload, &catalog()),
            Err(RejectionReason::UnexpectedKey(_))
        ));
    }

    #[test]
    fn accepted_event_normalizes_with_value_and_type_semantics_preserved() {
        let payload = json!({
            "site": "3",
            "at": "2024-06-15T14:30:00",
            "type": 0,
            "val": -1
        });
        let event = validate(&payload, &catalog()).unwrap();
        let record = TransactionRecord::from(event);

        assert_eq!(record.exhibition_id, 3);
        assert_eq!(record.value, None);
        assert_eq!(record.interaction, Some(InteractionType::Assistance));
        assert_eq!(
            record.transaction_date,
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert_eq!(record.transaction_time.to_string(), "14:30:00");
    }

    #[test]
    fn non_object_payload_rejects() {
        assert_eq!(
            validate(&json!([1, 2, 3]), &catalog()),
            Err(RejectionReason::NotAnObject)
        );
    }
}
