//! Schema inspection and offline validation

use anyhow::{Context, Result};
use colored::Colorize;
use predictor_lib::{FeatureSchema, ValidationFailure, Validator};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tabled::Tabled;

use super::problem_rows;
use crate::client::{ApiClient, SchemaInfo};
use crate::output::{print_error, print_json, print_success, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct FieldRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Field")]
    name: String,
}

fn field_rows(fields: &[String]) -> Vec<FieldRow> {
    fields
        .iter()
        .enumerate()
        .map(|(position, name)| FieldRow {
            position,
            name: name.clone(),
        })
        .collect()
}

/// Show the feature schema served by the API
pub async fn show_schema(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info: SchemaInfo = client.get("schema").await?;

    match format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Table => {
            println!("{}", "Served Schema".bold());
            println!("Model version: {}", info.model_version.cyan());
            println!("Threshold:     {}", info.threshold);
            println!();
            print_table(&field_rows(&info.fields), format);
        }
    }

    Ok(())
}

/// Show the built-in schema without contacting the server
pub fn show_local_schema(format: OutputFormat) {
    let schema = FeatureSchema::diabetes_indicators();

    match format {
        OutputFormat::Json => print_json(schema.fields()),
        OutputFormat::Table => {
            println!("{}", "Built-in Schema".bold());
            print_table(&field_rows(schema.fields()), format);
        }
    }
}

/// Validation outcome for one record in a file
#[derive(Debug, Serialize)]
pub struct RecordReport {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ValidationFailure>,
}

/// Validate one object or an array of objects without contacting the server
pub fn validate_records(value: &Value, validator: &Validator) -> Vec<RecordReport> {
    let records: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| RecordReport {
            index,
            failure: validator.validate_value(record).err(),
        })
        .collect()
}

/// Validate a record file offline
pub fn validate_file(path: &Path, strict: bool, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).context("Record file is not valid JSON")?;

    let schema = FeatureSchema::diabetes_indicators();
    let validator = if strict {
        Validator::strict(schema)
    } else {
        Validator::new(schema)
    };

    let reports = validate_records(&value, &validator);
    let rejected = reports.iter().filter(|r| r.failure.is_some()).count();

    match format {
        OutputFormat::Json => print_json(&reports),
        OutputFormat::Table => {
            for report in &reports {
                match &report.failure {
                    None => print_success(&format!("record {}: valid", report.index)),
                    Some(failure) => {
                        print_error(&format!(
                            "record {}: {} problem(s)",
                            report.index,
                            failure.problem_count()
                        ));
                        if let Some(payload) = &failure.payload {
                            print_error(&format!("payload: {}", payload));
                        }
                        let rows = problem_rows(
                            &failure.missing_fields,
                            &failure.unexpected_fields,
                            &failure.type_errors,
                        );
                        if !rows.is_empty() {
                            print_table(&rows, format);
                        }
                    }
                }
            }
        }
    }

    if rejected > 0 {
        anyhow::bail!("{} of {} record(s) failed validation", rejected, reports.len());
    }
    Ok(())
}
