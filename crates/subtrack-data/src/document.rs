//! Coercion of loosely shaped subscription documents into typed records.
//!
//! Documents come from plain JSON files or from `mongoexport`, so the same
//! field may arrive as a string, a number, or an extended-JSON wrapper such as
//! `{"$oid": "..."}`, `{"$date": ...}` or `{"$numberDouble": "..."}`. Both
//! camelCase and snake_case keys are accepted. Absent fields take the storage
//! schema defaults (`usageHours` 0, `lastUsed` null, `isAutoPay` false).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use subtrack_core::batch::{SkippedRecord, SourceEntry};
use subtrack_core::error::RecordError;
use subtrack_core::models::SubscriptionRecord;
use subtrack_core::time_utils::TimezoneHandler;

/// Converts raw JSON documents into [`SourceEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct DocumentConverter {
    tz: TimezoneHandler,
}

impl DocumentConverter {
    /// Offset-less date-time strings are interpreted in `tz`; bare dates are
    /// always UTC midnight.
    pub fn new(tz: TimezoneHandler) -> Self {
        Self { tz }
    }

    /// Convert one document. `location` labels the document in skip reasons
    /// when it carries no usable id (e.g. `subs.jsonl:4`).
    pub fn convert(&self, doc: &Value, location: &str) -> SourceEntry {
        let Some(obj) = doc.as_object() else {
            return Err(SkippedRecord {
                record_id: location.to_string(),
                name: String::new(),
                reason: RecordError::invalid("document", "expected a JSON object"),
            });
        };

        let name = match lookup(obj, &["name"]) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let Some(id) = lookup(obj, &["_id", "id"]).and_then(extract_id) else {
            return Err(SkippedRecord {
                record_id: location.to_string(),
                name,
                reason: RecordError::Incomplete {
                    missing: vec!["_id".to_string()],
                },
            });
        };

        let skip = |reason: RecordError| SkippedRecord {
            record_id: id.clone(),
            name: name.clone(),
            reason,
        };

        let user_id = lookup(obj, &["userId", "user_id"]).and_then(extract_id);

        let price = parse_number(lookup(obj, &["price"]), "price").map_err(skip)?;
        let due_date = self
            .parse_date(lookup(obj, &["dueDate", "due_date"]), "dueDate")
            .map_err(skip)?;
        let last_used = self
            .parse_date(lookup(obj, &["lastUsed", "last_used"]), "lastUsed")
            .map_err(skip)?;
        let usage_hours = match lookup(obj, &["usageHours", "usage_hours"]) {
            None => Some(0.0),
            present => parse_number(present, "usageHours").map_err(skip)?,
        };
        let is_auto_pay = match lookup(obj, &["isAutoPay", "is_auto_pay"]) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(skip(RecordError::invalid(
                    "isAutoPay",
                    format!("expected a boolean, got {other}"),
                )))
            }
        };

        Ok(SubscriptionRecord {
            id,
            user_id,
            name,
            price,
            due_date,
            is_auto_pay,
            usage_hours,
            last_used,
        })
    }

    /// Owner id of a raw document, if it has one. Used to filter by user
    /// before conversion so rejected documents are attributed too.
    pub fn owner_of(doc: &Value) -> Option<String> {
        doc.as_object()
            .and_then(|obj| lookup(obj, &["userId", "user_id"]))
            .and_then(extract_id)
    }

    /// `null`/absent → `None`; strings go through [`TimezoneHandler`];
    /// bare numbers are Unix seconds; `{"$date": n}` numbers are Unix
    /// milliseconds as written by MongoDB.
    fn parse_date(
        &self,
        value: Option<&Value>,
        field: &str,
    ) -> Result<Option<DateTime<Utc>>, RecordError> {
        let bad = |v: &Value| RecordError::invalid(field, format!("unrecognised date {v}"));
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => self
                .tz
                .parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| RecordError::invalid(field, format!("unrecognised date \"{s}\""))),
            Some(v @ Value::Number(n)) => {
                let secs = n.as_f64().ok_or_else(|| bad(v))?;
                from_epoch_millis(secs * 1000.0).map(Some).ok_or_else(|| bad(v))
            }
            Some(v @ Value::Object(inner)) => match inner.get("$date") {
                Some(Value::String(s)) => self
                    .tz
                    .parse_timestamp(s)
                    .map(Some)
                    .ok_or_else(|| bad(v)),
                Some(millis) => extended_number(millis)
                    .and_then(from_epoch_millis)
                    .map(Some)
                    .ok_or_else(|| bad(v)),
                None => Err(bad(v)),
            },
            Some(v) => Err(bad(v)),
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// First present key among `keys`.
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Identifier from a string, a number, or `{"$oid": "..."}`.
fn extract_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("$oid").and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

/// `null`/absent → `None`; numbers, numeric strings and the extended-JSON
/// number wrappers → `Some`.
fn parse_number(value: Option<&Value>, field: &str) -> Result<Option<f64>, RecordError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => extended_number(v)
            .map(Some)
            .ok_or_else(|| RecordError::invalid(field, format!("expected a number, got {v}"))),
    }
}

fn extended_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(obj) => ["$numberDouble", "$numberInt", "$numberLong", "$numberDecimal"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(extended_number),
        _ => None,
    }
}

fn from_epoch_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    let millis = millis.round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
