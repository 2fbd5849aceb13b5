use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::DriverError;

/// Field value types used in schema discovery output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Object,
    List,
}

/// Description of one field on a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

/// Ordered field map for one object, as returned by `get_fields`.
pub type ObjectSchema = BTreeMap<String, FieldSpec>;

pub fn field(field_type: FieldType, required: bool, description: &str) -> FieldSpec {
    FieldSpec {
        field_type,
        required,
        description: description.to_owned(),
    }
}

/// Builds the standard unknown-object error, carrying the available names
/// and near-miss suggestions.
pub fn unknown_object(requested: &str, available: &[&str]) -> DriverError {
    let listed = available.join(", ");
    let suggestions = suggest_similar(requested, available, 3);

    let mut error = DriverError::object_not_found(format!(
        "object '{requested}' not found, available: {listed}"
    ))
    .with_detail("requested", requested)
    .with_detail(
        "available",
        Value::from(available.iter().map(|name| Value::from(*name)).collect::<Vec<_>>()),
    );

    if !suggestions.is_empty() {
        error = error.with_detail(
            "did_you_mean",
            Value::from(suggestions.into_iter().map(Value::from).collect::<Vec<_>>()),
        );
    }

    error
}

/// Case-insensitive near-miss matching for object names: exact matches
/// first, then containment, then shared prefixes of at least 3 characters.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let needle = requested.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(u8, &str)> = Vec::new();
    for candidate in available {
        let hay = candidate.to_ascii_lowercase();
        let score = if hay == needle {
            3
        } else if hay.contains(&needle) || needle.contains(&hay) {
            2
        } else if common_prefix_len(&hay, &needle) >= 3 {
            1
        } else {
            continue;
        };
        scored.push((score, candidate));
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_owned())
        .collect()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_object_lists_available_names() {
        let err = unknown_object("customer", &["actors", "runs", "datasets"]);

        assert_eq!(err.kind(), crate::ErrorKind::ObjectNotFound);
        assert_eq!(
            err.detail("available"),
            Some(&json!(["actors", "runs", "datasets"]))
        );
    }

    #[test]
    fn suggests_near_misses() {
        let suggestions = suggest_similar("dataset", &["actors", "datasets", "runs"], 3);
        assert_eq!(suggestions, vec!["datasets"]);
    }

    #[test]
    fn suggests_shared_prefixes() {
        let suggestions = suggest_similar("res.part", &["res.partner", "res.users", "sale.order"], 3);
        assert_eq!(suggestions[0], "res.partner");
        assert!(suggestions.contains(&String::from("res.users")));
    }

    #[test]
    fn no_suggestions_for_distant_names() {
        assert!(suggest_similar("zzz", &["actors", "runs"], 3).is_empty());
    }

    #[test]
    fn field_spec_serializes_type_key() {
        let spec = field(FieldType::DateTime, false, "Creation timestamp");
        let value = serde_json::to_value(&spec).expect("serializes");

        assert_eq!(value.get("type"), Some(&json!("date_time")));
        assert_eq!(value.get("required"), Some(&json!(false)));
    }
}
