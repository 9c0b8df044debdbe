//! Fixed feature schema for the diabetes health-indicator classifier
//!
//! The schema is the single source of truth for which fields a request must
//! carry and in which column order they reach the model. It is built once at
//! startup and shared read-only afterwards.

use crate::error::SchemaError;
use std::collections::HashSet;
use std::sync::Arc;

/// Number of fields in the health-indicator schema
pub const NUM_FEATURES: usize = 21;

/// Field names in the column order the model was trained on
pub const DIABETES_FEATURES: [&str; NUM_FEATURES] = [
    "HighBP",
    "HighChol",
    "CholCheck",
    "BMI",
    "Smoker",
    "Stroke",
    "HeartDiseaseorAttack",
    "PhysActivity",
    "Fruits",
    "Veggies",
    "HvyAlcoholConsump",
    "AnyHealthcare",
    "NoDocbcCost",
    "GenHlth",
    "MentHlth",
    "PhysHlth",
    "DiffWalk",
    "Sex",
    "Age",
    "Education",
    "Income",
];

/// Ordered, immutable set of required input fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    fields: Arc<[String]>,
}

impl FeatureSchema {
    /// Build a schema from an ordered list of field names
    pub fn new<I, S>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for (idx, name) in fields.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName(idx));
            }
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateField(name.clone()));
            }
        }

        Ok(Self {
            fields: fields.into(),
        })
    }

    /// The 21-field BRFSS health-indicator schema
    pub fn diabetes_indicators() -> Self {
        Self {
            fields: DIABETES_FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Case-sensitive membership test
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Column index of a field
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// True if `value` is acceptable for `name`.
    ///
    /// Only finiteness is checked here. Semantic plausibility (a negative BMI,
    /// an out-of-range age code) belongs to the model.
    pub fn validate_domain(&self, name: &str, value: f64) -> bool {
        self.contains(name) && value.is_finite()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::diabetes_indicators()
    }
}
