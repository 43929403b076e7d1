//! JSON payload flattening

use crate::config::FieldMapping;
use crate::error::{Error, Result};
use crate::models::{Record, RecordType};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Flatten an API payload into one record per element.
///
/// The element list is the value at `mapping.items` (a JSON pointer) or the
/// payload root. Without a mapping, scalar elements become their own text and
/// flat objects become their compact JSON; anything nested is rejected.
pub fn extract_json(
    payload: &Value,
    origin_tag: &str,
    source_url: &Url,
    mapping: Option<&FieldMapping>,
) -> Result<Vec<Record>> {
    let items = match mapping.and_then(|m| m.items.as_deref()).filter(|p| !p.is_empty()) {
        Some(pointer) => payload.pointer(pointer).ok_or_else(|| {
            Error::UnsupportedShape(format!("no value at '{}' in payload", pointer))
        })?,
        None => payload,
    };

    let elements: Vec<&Value> = match items {
        Value::Array(values) => values.iter().collect(),
        Value::Object(_) if mapping.is_some() || is_flat(items) => vec![items],
        Value::Object(_) => {
            return Err(Error::UnsupportedShape(
                "nested object payload with no field mapping".to_string(),
            ))
        }
        other => {
            return Err(Error::UnsupportedShape(format!(
                "top-level {} cannot be flattened",
                type_name(other)
            )))
        }
    };

    let default_type = default_record_type(mapping);
    let mut records = Vec::with_capacity(elements.len());

    for (index, element) in elements.into_iter().enumerate() {
        let mapped = match mapping {
            Some(m) => map_element(element, m, default_type, index)?,
            None => unmapped_element(element, index)?,
        };
        if let Some((record_type, text)) = mapped {
            records.push(Record::new(origin_tag, source_url.clone(), record_type, text)?);
        }
    }

    Ok(records)
}

fn default_record_type(mapping: Option<&FieldMapping>) -> RecordType {
    mapping
        .and_then(|m| m.record_type.as_deref())
        .and_then(|s| s.parse().ok())
        .unwrap_or(RecordType::Custom)
}

fn map_element(
    element: &Value,
    mapping: &FieldMapping,
    default_type: RecordType,
    index: usize,
) -> Result<Option<(RecordType, String)>> {
    let object = element.as_object().ok_or_else(|| {
        Error::UnsupportedShape(format!(
            "element {} is a {}, mapping expects objects",
            index,
            type_name(element)
        ))
    })?;

    let text = match object.get(&mapping.text) {
        None | Some(Value::Null) => {
            debug!("element {} has no '{}' field; skipping", index, mapping.text);
            return Ok(None);
        }
        Some(value) => scalar_text(value).ok_or_else(|| {
            Error::UnsupportedShape(format!(
                "element {} field '{}' is a {}",
                index,
                mapping.text,
                type_name(value)
            ))
        })?,
    };

    let record_type = mapping
        .type_field
        .as_ref()
        .and_then(|field| object.get(field))
        .and_then(Value::as_str)
        .and_then(|label| label.parse().ok())
        .unwrap_or(default_type);

    Ok(Some((record_type, text)))
}

fn unmapped_element(element: &Value, index: usize) -> Result<Option<(RecordType, String)>> {
    if let Some(text) = scalar_text(element) {
        return Ok(Some((RecordType::Custom, text)));
    }
    match element {
        Value::Null => Ok(None),
        Value::Object(_) if is_flat(element) => {
            Ok(Some((RecordType::Custom, serde_json::to_string(element)?)))
        }
        other => Err(Error::UnsupportedShape(format!(
            "element {} is a nested {} with no field mapping",
            index,
            type_name(other)
        ))),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_flat(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().all(|v| !v.is_object() && !v.is_array()),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
