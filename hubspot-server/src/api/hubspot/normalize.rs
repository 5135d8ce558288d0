//! Mapping of raw HubSpot CRM records onto [`NormalizedItem`]

use crate::api::hubspot::models::{ItemType, NormalizedItem};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Map a HubSpot CRM v3 record onto a normalized item.
///
/// Total over any JSON value: missing properties fall back along a
/// per-type chain and timestamps are left `None` when HubSpot supplied none.
pub fn normalize(record: &Value, item_type: ItemType) -> NormalizedItem {
    let properties = record.get("properties").and_then(Value::as_object);
    let id = record_id(record);

    let name = match item_type {
        ItemType::Contact => {
            let full_name = format!(
                "{} {}",
                property(properties, "firstname").unwrap_or_default(),
                property(properties, "lastname").unwrap_or_default()
            );
            let full_name = full_name.trim();
            if !full_name.is_empty() {
                full_name.to_string()
            } else if let Some(email) = property(properties, "email") {
                email.to_string()
            } else {
                format!("id:{id}")
            }
        }
        ItemType::Company => property(properties, "name")
            .or_else(|| property(properties, "domain"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("company:{id}")),
        ItemType::Deal => property(properties, "dealname")
            .map(str::to_string)
            .unwrap_or_else(|| format!("deal:{id}")),
        ItemType::Other => id.clone(),
    };

    let (creation_time, last_modified_time) = match item_type {
        ItemType::Other => (
            record_field(record, "createdAt"),
            record_field(record, "updatedAt"),
        ),
        _ => (
            property(properties, "createdate").or_else(|| record_field(record, "createdAt")),
            property(properties, "hs_lastmodifieddate")
                .or_else(|| record_field(record, "updatedAt")),
        ),
    };

    NormalizedItem {
        id,
        item_type,
        name,
        creation_time: creation_time.map(str::to_string),
        last_modified_time: last_modified_time.map(str::to_string),
        parent_id: None,
        raw_properties: raw_properties(properties),
    }
}

/// Record id as a string; HubSpot sends strings but numeric ids are accepted
fn record_id(record: &Value) -> String {
    match record.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    }
}

/// Non-empty string property
fn property<'a>(properties: Option<&'a Map<String, Value>>, name: &str) -> Option<&'a str> {
    properties
        .and_then(|props| props.get(name))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Non-empty string field on the record itself
fn record_field<'a>(record: &'a Value, name: &str) -> Option<&'a str> {
    record
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn raw_properties(properties: Option<&Map<String, Value>>) -> BTreeMap<String, String> {
    let Some(properties) = properties else {
        return BTreeMap::new();
    };

    properties
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((key.clone(), text.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}
