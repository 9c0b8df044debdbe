//! Request validation against the feature schema
//!
//! The validator turns an untyped JSON object into a [`FeatureVector`] or a
//! [`ValidationFailure`] describing every problem in the request at once.

use crate::models::FeatureVector;
use crate::schema::FeatureSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Every problem found in a rejected request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub missing_fields: BTreeSet<String>,
    pub unexpected_fields: BTreeSet<String>,
    pub type_errors: BTreeMap<String, String>,
    /// Set when the payload itself is not a JSON object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl ValidationFailure {
    /// Failure for a payload that is not an object at all
    pub fn malformed_payload(schema: &FeatureSchema, reason: impl Into<String>) -> Self {
        Self {
            missing_fields: schema.fields().iter().cloned().collect(),
            payload: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty()
            && self.unexpected_fields.is_empty()
            && self.type_errors.is_empty()
            && self.payload.is_none()
    }

    /// Total number of individual problems
    pub fn problem_count(&self) -> usize {
        self.missing_fields.len()
            + self.unexpected_fields.len()
            + self.type_errors.len()
            + usize::from(self.payload.is_some())
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(payload) = &self.payload {
            parts.push(format!("invalid payload ({})", payload));
        }
        if !self.missing_fields.is_empty() {
            parts.push(format!("missing fields: {}", join(&self.missing_fields)));
        }
        if !self.unexpected_fields.is_empty() {
            parts.push(format!(
                "unexpected fields: {}",
                join(&self.unexpected_fields)
            ));
        }
        if !self.type_errors.is_empty() {
            parts.push(format!("invalid values: {}", join(self.type_errors.keys())));
        }
        if parts.is_empty() {
            write!(f, "Request validation failed")
        } else {
            write!(f, "Request validation failed: {}", parts.join("; "))
        }
    }
}

impl std::error::Error for ValidationFailure {}

fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks requests against a schema
#[derive(Debug, Clone)]
pub struct Validator {
    schema: FeatureSchema,
    strict_numbers: bool,
}

impl Validator {
    /// Validator that also accepts numeric strings such as `"26.0"`
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            strict_numbers: false,
        }
    }

    /// Validator that only accepts JSON numbers
    pub fn strict(schema: FeatureSchema) -> Self {
        Self {
            schema,
            strict_numbers: true,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn is_strict(&self) -> bool {
        self.strict_numbers
    }

    /// Validate any JSON value; non-objects are rejected wholesale
    pub fn validate_value(&self, payload: &Value) -> Result<FeatureVector, ValidationFailure> {
        match payload {
            Value::Object(record) => self.validate(record),
            other => Err(ValidationFailure::malformed_payload(
                &self.schema,
                format!("expected a JSON object, got {}", json_type_name(other)),
            )),
        }
    }

    /// Validate a request object in a single pass over schema and input
    pub fn validate(&self, record: &Map<String, Value>) -> Result<FeatureVector, ValidationFailure> {
        let mut failure = ValidationFailure::default();
        let mut values = Vec::with_capacity(self.schema.len());

        for name in self.schema.fields() {
            match record.get(name) {
                None => {
                    failure.missing_fields.insert(name.clone());
                }
                Some(raw) => match self.coerce(raw) {
                    Ok(value) if self.schema.validate_domain(name, value) => values.push(value),
                    Ok(value) => {
                        failure
                            .type_errors
                            .insert(name.clone(), format!("value {} is not finite", value));
                    }
                    Err(reason) => {
                        failure.type_errors.insert(name.clone(), reason);
                    }
                },
            }
        }

        for key in record.keys() {
            if !self.schema.contains(key) {
                failure.unexpected_fields.insert(key.clone());
            }
        }

        if failure.is_empty() {
            Ok(FeatureVector::new(values))
        } else {
            Err(failure)
        }
    }

    fn coerce(&self, raw: &Value) -> Result<f64, String> {
        match raw {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| format!("number {} is not representable as a real", n)),
            Value::String(s) if !self.strict_numbers => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("string {:?} is not numeric", s)),
            other => Err(format!("expected a number, got {}", json_type_name(other))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
