//! CLI subcommands

pub mod health;
pub mod predict;
pub mod schema;

use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

/// One field-level problem in a rejected record
#[derive(Debug, Tabled, Serialize)]
pub struct ProblemRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Problem")]
    pub problem: String,
}

/// Flatten missing, unexpected and mistyped fields into table rows
pub fn problem_rows<'a>(
    missing: impl IntoIterator<Item = &'a String>,
    unexpected: impl IntoIterator<Item = &'a String>,
    type_errors: &BTreeMap<String, String>,
) -> Vec<ProblemRow> {
    let mut rows: Vec<ProblemRow> = missing
        .into_iter()
        .map(|field| ProblemRow {
            field: field.clone(),
            problem: "missing".to_string(),
        })
        .collect();
    rows.extend(unexpected.into_iter().map(|field| ProblemRow {
        field: field.clone(),
        problem: "unexpected".to_string(),
    }));
    rows.extend(type_errors.iter().map(|(field, reason)| ProblemRow {
        field: field.clone(),
        problem: reason.clone(),
    }));
    rows
}
