//! Envelope-shape-tolerant response parsing.
//!
//! The vendor APIs wrap record lists under a handful of different top-level
//! keys (or return bare arrays). Extraction tries the documented key first,
//! then the common variations, and falls back to treating the whole object
//! as a single record.

use serde_json::{Map, Value};

use crate::error::DriverError;

/// Opaque record as returned by a remote API.
pub type Record = Map<String, Value>;

/// Candidate envelope keys, in priority order. Case-sensitive.
const RECORD_KEYS: [&str; 8] = [
    "items", "Items", "data", "Data", "results", "Results", "records", "Records",
];

const TOTAL_KEYS: [&str; 3] = ["total", "count", "totalItemCount"];

/// Pagination hints carried by an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub has_more: Option<bool>,
    pub next_cursor: Option<String>,
    pub total: Option<u64>,
}

/// Parses a response body, mapping invalid JSON to a connection error with
/// a truncated body preview.
pub fn parse_json(body: &str, status: u16) -> Result<Value, DriverError> {
    serde_json::from_str(body).map_err(|error| {
        DriverError::connection("invalid JSON response from API")
            .with_detail("status_code", status)
            .with_detail("content", preview(body))
            .with_detail("error", error.to_string())
    })
}

/// Extracts the record list from a parsed response value.
pub fn extract_records(value: &Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items.iter().cloned().map(into_record).collect(),
        Value::Object(object) => {
            let mut saw_empty_candidate = false;
            for key in RECORD_KEYS {
                match object.get(key) {
                    None | Some(Value::Null) => {}
                    Some(Value::Array(items)) if items.is_empty() => {
                        saw_empty_candidate = true;
                    }
                    Some(Value::Array(items)) => {
                        return items.iter().cloned().map(into_record).collect();
                    }
                    Some(other) => {
                        return vec![into_record(other.clone())];
                    }
                }
            }

            if saw_empty_candidate {
                Vec::new()
            } else {
                // No envelope key found; the response itself is the record.
                vec![object.clone()]
            }
        }
        _ => Vec::new(),
    }
}

/// Reads pagination hints from an envelope object.
pub fn page_info(value: &Value) -> PageInfo {
    let Value::Object(object) = value else {
        return PageInfo::default();
    };

    let has_more = object.get("has_more").and_then(Value::as_bool);

    let next_cursor = object
        .get("next")
        .and_then(Value::as_str)
        .or_else(|| object.get("nextCursor").and_then(Value::as_str))
        .or_else(|| {
            object
                .get("pagination")
                .and_then(|pagination| pagination.get("pageToken"))
                .and_then(Value::as_str)
        })
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    let total = TOTAL_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_u64));

    PageInfo {
        has_more,
        next_cursor,
        total,
    }
}

/// Coerces a JSON value into a record; scalars are wrapped under `value`.
pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert(String::from("value"), other);
            map
        }
    }
}

fn preview(body: &str) -> String {
    let mut end = body.len().min(500);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_owned()
}
