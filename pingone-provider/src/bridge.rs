//! Value bridge
//!
//! Converts host attribute values to the platform's JSON model and back.
//! Absent platform fields read as null, present zero values read as known
//! zero values, and unknown placeholders are never sent.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use pingone_core::diagnostics::Diagnostic;
use pingone_core::resource::Value;
use serde_json::{Map, Number};

/// Platform-side shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    /// 32-bit signed integer on the platform
    Int32,
    Int64,
    /// 32-bit float on the platform
    Float32,
    /// ISO-8601 timestamp
    Timestamp,
    /// Array whose order is not significant
    StringSet,
    /// Array whose order is significant
    StringList,
    /// Host value to platform enum value
    Mapped(&'static [(&'static str, &'static str)]),
}

/// How a null host value is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Null is left out of the request; the platform keeps its value
    #[default]
    OmitNull,
    /// Null is sent as JSON null; the platform clears the field
    NullClears,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("Value {value} for \"{field}\" does not fit in a 32-bit integer")]
    IntOverflow { field: String, value: i64 },

    #[error("Value {value} for \"{field}\" does not fit in a 32-bit float")]
    FloatOverflow { field: String, value: f64 },

    #[error("Attribute \"{field}\": expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: String,
    },

    #[error("Attribute \"{field}\": invalid timestamp '{value}': {reason}")]
    InvalidTimestamp {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Attribute \"{field}\": timestamp '{value}' must include a timezone")]
    MissingTimezone { field: String, value: String },

    #[error("Attribute \"{field}\": unsupported value '{value}'")]
    Unmapped { field: String, value: String },
}

impl BridgeError {
    pub fn field(&self) -> &str {
        match self {
            BridgeError::IntOverflow { field, .. }
            | BridgeError::FloatOverflow { field, .. }
            | BridgeError::TypeMismatch { field, .. }
            | BridgeError::InvalidTimestamp { field, .. }
            | BridgeError::MissingTimezone { field, .. }
            | BridgeError::Unmapped { field, .. } => field,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error("Invalid attribute value")
            .with_detail(self.to_string())
            .for_attribute(self.field())
    }
}

fn mismatch(field: &str, expected: &'static str, got: impl ToString) -> BridgeError {
    BridgeError::TypeMismatch {
        field: field.to_string(),
        expected,
        got: got.to_string(),
    }
}

// =========================================================================
// Host -> platform
// =========================================================================

/// Platform JSON for a host value. Null and unknown produce nothing.
pub fn to_platform(
    field: &str,
    kind: FieldKind,
    value: &Value,
) -> Result<Option<serde_json::Value>, BridgeError> {
    if !value.is_known() {
        return Ok(None);
    }
    let json = match (kind, value) {
        (FieldKind::String, Value::String(s)) => serde_json::Value::String(s.clone()),
        (FieldKind::Bool, Value::Bool(b)) => serde_json::Value::Bool(*b),
        (FieldKind::Int32, Value::Int(n)) => {
            let narrowed = i32::try_from(*n).map_err(|_| BridgeError::IntOverflow {
                field: field.to_string(),
                value: *n,
            })?;
            serde_json::Value::from(narrowed)
        }
        (FieldKind::Int64, Value::Int(n)) => serde_json::Value::from(*n),
        (FieldKind::Float32, Value::Float(_) | Value::Int(_)) => {
            let n = value.as_f64().unwrap_or_default();
            if !n.is_finite() || n.abs() > f32::MAX as f64 {
                return Err(BridgeError::FloatOverflow {
                    field: field.to_string(),
                    value: n,
                });
            }
            Number::from_f64(n)
                .map(serde_json::Value::Number)
                .ok_or_else(|| mismatch(field, "finite number", n))?
        }
        (FieldKind::Timestamp, Value::String(s)) => {
            serde_json::Value::String(timestamp_for_write(field, s)?)
        }
        (FieldKind::StringSet | FieldKind::StringList, Value::List(items) | Value::Set(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(serde_json::Value::String(s.clone())),
                    other => return Err(mismatch(field, "string element", other)),
                }
            }
            serde_json::Value::Array(out)
        }
        (FieldKind::Mapped(pairs), Value::String(s)) => {
            let (_, platform) = pairs
                .iter()
                .find(|(host, _)| host == s)
                .ok_or_else(|| BridgeError::Unmapped {
                    field: field.to_string(),
                    value: s.clone(),
                })?;
            serde_json::Value::String(platform.to_string())
        }
        (kind, other) => return Err(mismatch(field, kind_name(kind), other)),
    };
    Ok(Some(json))
}

/// Write a host value into a request body at a dotted path
pub fn write_field(
    body: &mut Map<String, serde_json::Value>,
    path: &str,
    field: &str,
    kind: FieldKind,
    mode: WriteMode,
    value: &Value,
) -> Result<(), BridgeError> {
    match to_platform(field, kind, value)? {
        Some(json) => set_path(body, path, json),
        None if value.is_null() && mode == WriteMode::NullClears => {
            set_path(body, path, serde_json::Value::Null)
        }
        None => {}
    }
    Ok(())
}

// =========================================================================
// Platform -> host
// =========================================================================

/// Host value for a platform field; absent and JSON null read as null
pub fn from_platform(
    field: &str,
    kind: FieldKind,
    json: Option<&serde_json::Value>,
) -> Result<Value, BridgeError> {
    let json = match json {
        None | Some(serde_json::Value::Null) => return Ok(Value::Null),
        Some(j) => j,
    };
    let value = match (kind, json) {
        (FieldKind::String, serde_json::Value::String(s)) => Value::String(s.clone()),
        (FieldKind::Bool, serde_json::Value::Bool(b)) => Value::Bool(*b),
        (FieldKind::Int32 | FieldKind::Int64, serde_json::Value::Number(n)) => {
            Value::Int(n.as_i64().ok_or_else(|| mismatch(field, "integer", n))?)
        }
        (FieldKind::Float32, serde_json::Value::Number(n)) => {
            Value::Float(n.as_f64().ok_or_else(|| mismatch(field, "number", n))?)
        }
        (FieldKind::Timestamp, serde_json::Value::String(s)) => {
            Value::String(timestamp_from_read(field, s)?)
        }
        (FieldKind::StringSet, serde_json::Value::Array(items)) => {
            Value::set(string_items(field, items)?)
        }
        (FieldKind::StringList, serde_json::Value::Array(items)) => {
            Value::List(string_items(field, items)?)
        }
        (FieldKind::Mapped(pairs), serde_json::Value::String(s)) => {
            let (host, _) = pairs
                .iter()
                .find(|(_, platform)| platform == s)
                .ok_or_else(|| BridgeError::Unmapped {
                    field: field.to_string(),
                    value: s.clone(),
                })?;
            Value::String(host.to_string())
        }
        (kind, other) => return Err(mismatch(field, kind_name(kind), other)),
    };
    Ok(value)
}

fn string_items(field: &str, items: &[serde_json::Value]) -> Result<Vec<Value>, BridgeError> {
    items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            other => Err(mismatch(field, "string element", other)),
        })
        .collect()
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "string",
        FieldKind::Bool => "bool",
        FieldKind::Int32 => "32-bit integer",
        FieldKind::Int64 => "integer",
        FieldKind::Float32 => "32-bit float",
        FieldKind::Timestamp => "timestamp",
        FieldKind::StringSet => "set of strings",
        FieldKind::StringList => "list of strings",
        FieldKind::Mapped(_) => "enumerated string",
    }
}

// =========================================================================
// Timestamps
// =========================================================================

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn canonical(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Timestamps sent to the platform must carry a timezone
fn timestamp_for_write(field: &str, s: &str) -> Result<String, BridgeError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(canonical(dt.with_timezone(&Utc))),
        Err(e) => {
            if NaiveDateTime::parse_from_str(s, NAIVE_FORMAT).is_ok() {
                Err(BridgeError::MissingTimezone {
                    field: field.to_string(),
                    value: s.to_string(),
                })
            } else {
                Err(BridgeError::InvalidTimestamp {
                    field: field.to_string(),
                    value: s.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Timestamps read from the platform are normalised to UTC; a missing
/// timezone is taken as UTC
fn timestamp_from_read(field: &str, s: &str) -> Result<String, BridgeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(canonical(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(s, NAIVE_FORMAT)
        .map(|naive| canonical(naive.and_utc()))
        .map_err(|e| BridgeError::InvalidTimestamp {
            field: field.to_string(),
            value: s.to_string(),
            reason: e.to_string(),
        })
}

// =========================================================================
// JSON paths
// =========================================================================

/// Value at a dotted path (e.g., "license.id")
pub fn get_path<'a>(json: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(json, |node, key| node.get(key))
}

/// Set a value at a dotted path, creating intermediate objects
pub fn set_path(body: &mut Map<String, serde_json::Value>, path: &str, value: serde_json::Value) {
    match path.split_once('.') {
        None => {
            body.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = body
                .entry(head.to_string())
                .or_insert_with(|| serde_json::Value::Object(Map::new()));
            if !child.is_object() {
                *child = serde_json::Value::Object(Map::new());
            }
            if let serde_json::Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}
