//! Resource - Representing desired configuration and recorded state
//!
//! Every attribute value is tri-state: null (not set), unknown (a plan-time
//! placeholder the host will resolve later) or a known value.

use std::collections::BTreeMap;
use std::fmt;

/// Attribute map keyed by attribute name
pub type Attributes = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The attribute is not set
    Null,
    /// Placeholder for a value that is only known after apply
    Unknown,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Ordered list
    List(Vec<Value>),
    /// Unordered set, kept in canonical order (see [`Value::set`])
    Set(Vec<Value>),
    /// Nested block
    Object(Attributes),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build a set value. Elements are sorted by their canonical key and
    /// duplicates are removed, so identical contents always produce an
    /// identical value regardless of arrival order.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut keyed: Vec<(String, Value)> = items
            .into_iter()
            .map(|v| (v.canonical_key(), v))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        Value::Set(keyed.into_iter().map(|(_, v)| v).collect())
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn is_known(&self) -> bool {
        !self.is_null() && !self.is_unknown()
    }

    /// Known, or a placeholder the user supplied an expression for
    pub fn is_set(&self) -> bool {
        !self.is_null()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Attributes> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Elements of a list or set
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Field of a nested block, null when absent
    pub fn field(&self, name: &str) -> &Value {
        self.as_object().and_then(|m| m.get(name)).unwrap_or(&NULL)
    }

    /// Stable textual key used to order set elements
    pub fn canonical_key(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Unknown => "unknown".to_string(),
            Value::String(s) => format!("s:{}", escape_key(s)),
            Value::Int(n) => format!("i:{:020}", n),
            Value::Float(n) => format!("f:{}", n),
            Value::Bool(b) => format!("b:{}", b),
            Value::List(items) | Value::Set(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.canonical_key()).collect();
                format!("[{}]", inner.join(","))
            }
            Value::Object(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", escape_key(k), v.canonical_key()))
                    .collect();
                format!("{{{}}}", inner.join(","))
            }
        }
    }

    /// Convert a host JSON document into a value. JSON null becomes null,
    /// arrays become lists; unknown cannot be expressed in JSON.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::Null => "Null".to_string(),
            Value::Unknown => "Unknown".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Set(_) => "Set".to_string(),
            Value::Object(_) => "Object".to_string(),
        }
    }
}

/// Escape the separators of canonical keys so distinct values never share one
fn escape_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | ',' | '=' | ']' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Unknown => write!(f, "(known after apply)"),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) | Value::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Desired configuration (or plan) for one resource or data source
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Resource type without the provider prefix (e.g., "environment")
    pub resource_type: String,
    pub attributes: Attributes,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Attribute value, null when absent
    pub fn get(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&NULL)
    }
}

/// State recorded for a resource after talking to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub resource_type: String,
    /// Platform identifier of the entity
    pub identifier: Option<String>,
    pub attributes: Attributes,
    /// Whether the entity exists
    pub exists: bool,
}

impl State {
    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            identifier: None,
            attributes: Attributes::new(),
            exists: false,
        }
    }

    pub fn existing(resource_type: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            resource_type: resource_type.into(),
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Attribute value, null when absent
    pub fn get(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&NULL)
    }

    /// View this state as a desired configuration
    pub fn to_resource(&self) -> Resource {
        Resource {
            resource_type: self.resource_type.clone(),
            attributes: self.attributes.clone(),
        }
    }
}
