//! Schema - Define attribute schemas for resources and data sources
//!
//! Descriptors publish one schema per type. The lifecycle engine validates
//! configuration against it before any network call is made.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::resource::{Attributes, Value};

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    /// Nested block with its own attributes
    Object(Vec<AttributeSchema>),
}

impl AttributeType {
    /// Check if a known value conforms to this type. Null and unknown are
    /// always accepted here; presence is checked by the attribute mode.
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (_, Value::Null | Value::Unknown) => Ok(()),
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Float, Value::Float(_) | Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items))
            | (AttributeType::Set(inner), Value::Set(items) | Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Object(fields), Value::Object(map)) => {
                for key in map.keys() {
                    if !fields.iter().any(|f| &f.name == key) {
                        return Err(TypeError::UnknownAttribute { name: key.clone() });
                    }
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    /// The structural type beneath any custom wrappers
    pub fn structure(&self) -> &AttributeType {
        match self {
            AttributeType::Custom { base, .. } => base.structure(),
            other => other,
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Object(_) => "Object".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },
}

/// How an attribute is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    Required,
    Optional,
    /// Set by the platform only
    Computed,
    /// Set by the user, or by the platform when the user leaves it unset
    OptionalComputed,
}

impl AttributeMode {
    pub fn is_computed(&self) -> bool {
        matches!(self, AttributeMode::Computed | AttributeMode::OptionalComputed)
    }
}

/// Per-attribute value validator
#[derive(Debug, Clone)]
pub enum Validator {
    NonEmpty,
    /// Element count of a list or set
    SizeBetween { min: usize, max: usize },
}

impl Validator {
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Validator::NonEmpty, Value::String(s)) if s.is_empty() => {
                Err("must not be empty".to_string())
            }
            (Validator::SizeBetween { min, max }, Value::List(items) | Value::Set(items))
                if items.len() < *min || items.len() > *max =>
            {
                Err(format!(
                    "must contain between {} and {} elements, got {}",
                    min,
                    max,
                    items.len()
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub mode: AttributeMode,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub validators: Vec<Validator>,
    /// Attributes that must not be set together with this one
    pub conflicts_with: Vec<String>,
    /// A change forces the entity to be replaced
    pub requires_replace: bool,
    pub sensitive: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            mode: AttributeMode::Optional,
            default: None,
            description: None,
            validators: Vec::new(),
            conflicts_with: Vec::new(),
            requires_replace: false,
            sensitive: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.mode = AttributeMode::Required;
        self
    }

    pub fn computed(mut self) -> Self {
        self.mode = AttributeMode::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.mode = AttributeMode::OptionalComputed;
        self
    }

    /// Default applied at plan time when the user leaves the attribute unset
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        if self.mode == AttributeMode::Optional {
            self.mode = AttributeMode::OptionalComputed;
        }
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn conflicts_with(mut self, other: impl Into<String>) -> Self {
        self.conflicts_with.push(other.into());
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn check(&self, path: &str, value: &Value, diags: &mut Diagnostics) {
        if value.is_null() {
            if self.mode == AttributeMode::Required && self.default.is_none() {
                diags.push(
                    Diagnostic::error("Missing required argument")
                        .with_detail(format!("The argument \"{}\" is required.", path))
                        .for_attribute(path),
                );
            }
            return;
        }
        if value.is_unknown() {
            return;
        }

        if let Err(e) = self.attr_type.validate(value) {
            diags.push(
                Diagnostic::error("Invalid attribute value")
                    .with_detail(e.to_string())
                    .for_attribute(path),
            );
            return;
        }

        for validator in &self.validators {
            if let Err(message) = validator.check(value) {
                diags.push(
                    Diagnostic::error("Invalid attribute value")
                        .with_detail(format!("Attribute {} {}", path, message))
                        .for_attribute(path),
                );
            }
        }

        match (self.attr_type.structure(), value) {
            (AttributeType::Object(fields), Value::Object(_)) => {
                check_fields(fields, path, value, diags);
            }
            (AttributeType::List(inner) | AttributeType::Set(inner), _) => {
                if let AttributeType::Object(fields) = inner.as_ref()
                    && let Some(items) = value.as_items()
                {
                    for (i, item) in items.iter().enumerate() {
                        check_fields(fields, &format!("{}[{}]", path, i), item, diags);
                    }
                }
            }
            _ => {}
        }
    }
}

fn check_fields(fields: &[AttributeSchema], path: &str, value: &Value, diags: &mut Diagnostics) {
    if value.is_unknown() {
        return;
    }
    for field in fields {
        let child = format!("{}.{}", path, field.name);
        field.check(&child, value.field(&field.name), diags);
    }
}

/// Variant of a tagged-union resource: the discriminator value and the
/// attribute group valid for it
#[derive(Debug, Clone)]
pub struct Variant {
    pub value: String,
    pub attributes: Vec<String>,
    pub required: Vec<String>,
}

impl Variant {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            attributes: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn optional(mut self, attributes: &[&str]) -> Self {
        self.attributes
            .extend(attributes.iter().map(|s| s.to_string()));
        self
    }

    pub fn required(mut self, attributes: &[&str]) -> Self {
        self.required.extend(attributes.iter().map(|s| s.to_string()));
        self.optional(attributes)
    }
}

/// Discriminator attribute selecting which variant group is valid
#[derive(Debug, Clone)]
pub struct Discriminator {
    pub attribute: String,
    pub variants: Vec<Variant>,
}

impl Discriminator {
    pub fn new(attribute: impl Into<String>, variants: Vec<Variant>) -> Self {
        Self {
            attribute: attribute.into(),
            variants,
        }
    }

    pub fn variant(&self, value: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.value == value)
    }

    /// Every attribute that belongs to some variant group
    pub fn grouped_attributes(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .variants
            .iter()
            .flat_map(|v| v.attributes.iter().map(String::as_str))
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    fn check(&self, attributes: &Attributes, diags: &mut Diagnostics) {
        let selected = match attributes.get(&self.attribute) {
            Some(Value::String(s)) => s,
            _ => return,
        };
        let Some(variant) = self.variant(selected) else {
            return;
        };

        // Plan-time placeholders for computed group members are not leakage
        for name in self.grouped_attributes() {
            let set = attributes.get(name).is_some_and(Value::is_known);
            if set && !variant.attributes.iter().any(|a| a == name) {
                diags.push(
                    Diagnostic::error("Invalid attribute combination")
                        .with_detail(format!(
                            "Attribute \"{}\" cannot be set when \"{}\" is \"{}\".",
                            name, self.attribute, selected
                        ))
                        .for_attribute(name),
                );
            }
        }
        for name in &variant.required {
            if !attributes.get(name).is_some_and(Value::is_set) {
                diags.push(
                    Diagnostic::error("Missing required argument")
                        .with_detail(format!(
                            "Attribute \"{}\" is required when \"{}\" is \"{}\".",
                            name, self.attribute, selected
                        ))
                        .for_attribute(name),
                );
            }
        }
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: BTreeMap<String, AttributeSchema>,
    pub description: Option<String>,
    /// Groups of attributes of which exactly one must be set
    pub exactly_one_of: Vec<Vec<String>>,
    pub discriminator: Option<Discriminator>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: BTreeMap::new(),
            description: None,
            exactly_one_of: Vec::new(),
            discriminator: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn exactly_one_of(mut self, group: &[&str]) -> Self {
        self.exactly_one_of
            .push(group.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    /// Validate user configuration. Computed-only attributes must not be set.
    pub fn validate(&self, attributes: &Attributes) -> Diagnostics {
        let mut diags = Diagnostics::new();

        for name in attributes.keys() {
            if !self.attributes.contains_key(name) {
                diags.push(
                    Diagnostic::error("Unsupported argument")
                        .with_detail(format!(
                            "An argument named \"{}\" is not expected here.",
                            name
                        ))
                        .for_attribute(name),
                );
            }
        }

        for (name, schema) in &self.attributes {
            let value = attributes.get(name).unwrap_or(&Value::Null);
            if schema.mode == AttributeMode::Computed && value.is_set() {
                diags.push(
                    Diagnostic::error("Invalid configuration")
                        .with_detail(format!(
                            "Attribute \"{}\" is computed by the platform and cannot be set.",
                            name
                        ))
                        .for_attribute(name),
                );
                continue;
            }
            schema.check(name, value, &mut diags);

            // Placeholders may still resolve to null; conflicts wait for
            // known values
            if value.is_known() {
                for other in &schema.conflicts_with {
                    if attributes.get(other).is_some_and(Value::is_known) {
                        diags.push(
                            Diagnostic::error("Invalid parameter combination")
                                .with_detail(format!(
                                    "Attribute \"{}\" cannot be specified when \"{}\" is specified.",
                                    name, other
                                ))
                                .for_attribute(name),
                        );
                    }
                }
            }
        }

        for group in &self.exactly_one_of {
            if group
                .iter()
                .any(|a| attributes.get(a.as_str()).is_some_and(Value::is_unknown))
            {
                continue;
            }
            let set: Vec<&String> = group
                .iter()
                .filter(|a| attributes.get(a.as_str()).is_some_and(Value::is_set))
                .collect();
            let listed = group
                .iter()
                .map(|a| format!("\"{}\"", a))
                .collect::<Vec<_>>()
                .join(", ");
            if set.is_empty() {
                diags.push(Diagnostic::error("Missing parameter").with_detail(format!(
                    "Exactly one of these attributes must be configured: [{}]",
                    listed
                )));
            } else if set.len() > 1 {
                diags.push(
                    Diagnostic::error("Invalid parameter combination").with_detail(format!(
                        "Only one of these attributes may be configured: [{}]",
                        listed
                    )),
                );
            }
        }

        if let Some(ref discriminator) = self.discriminator {
            discriminator.check(attributes, &mut diags);
        }

        diags
    }

    /// Fill schema defaults into null attributes, including nested blocks
    pub fn apply_defaults(&self, attributes: &mut Attributes) {
        for (name, schema) in &self.attributes {
            let entry = attributes.entry(name.clone()).or_insert(Value::Null);
            apply_default(schema, entry);
        }
    }

    /// Bring values into the shape reads produce: sets in canonical order
    /// and nested blocks without null fields
    pub fn normalize(&self, attributes: &mut Attributes) {
        for (name, schema) in &self.attributes {
            if let Some(value) = attributes.get_mut(name) {
                normalize_value(&schema.attr_type, value);
            }
        }
    }

    /// Names of attributes whose change forces replacement
    pub fn replace_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .values()
            .filter(|a| a.requires_replace)
            .map(|a| a.name.as_str())
    }
}

fn apply_default(schema: &AttributeSchema, value: &mut Value) {
    if value.is_null()
        && let Some(ref default) = schema.default
    {
        *value = default.clone();
    }
    if let (AttributeType::Object(fields), Value::Object(map)) = (&schema.attr_type, &mut *value) {
        for field in fields {
            let entry = map.entry(field.name.clone()).or_insert(Value::Null);
            apply_default(field, entry);
        }
    }
}

fn normalize_value(attr_type: &AttributeType, value: &mut Value) {
    match (attr_type.structure(), value) {
        (AttributeType::Set(inner), value @ (Value::List(_) | Value::Set(_))) => {
            let mut items = match std::mem::replace(value, Value::Null) {
                Value::List(items) | Value::Set(items) => items,
                _ => Vec::new(),
            };
            for item in &mut items {
                normalize_value(inner, item);
            }
            *value = Value::set(items);
        }
        (AttributeType::List(inner), Value::List(items)) => {
            for item in items {
                normalize_value(inner, item);
            }
        }
        (AttributeType::Object(fields), Value::Object(map)) => {
            map.retain(|_, v| !v.is_null());
            for field in fields {
                if let Some(child) = map.get_mut(&field.name) {
                    normalize_value(&field.attr_type, child);
                }
            }
        }
        _ => {}
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    static UUID: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("UUID is a valid regex pattern")
    });

    /// Whether the string is a lowercase hyphenated UUID
    pub fn is_resource_id(s: &str) -> bool {
        UUID.is_match(s)
    }

    /// Platform resource identifier (UUID-shaped)
    pub fn resource_id() -> AttributeType {
        AttributeType::Custom {
            name: "ResourceId".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if is_resource_id(s) => Ok(()),
                Value::String(s) => Err(format!(
                    "Expected a lowercase UUID (e.g. 00000000-0000-0000-0000-000000000000), got '{}'",
                    s
                )),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    /// Enum over the given values
    pub fn enum_of<S: AsRef<str>>(values: &[S]) -> AttributeType {
        AttributeType::Enum(values.iter().map(|v| v.as_ref().to_string()).collect())
    }

    /// Set of strings
    pub fn string_set() -> AttributeType {
        AttributeType::Set(Box::new(AttributeType::String))
    }
}
