//! Prediction commands

use anyhow::{Context, Result};
use colored::Colorize;
use predictor_lib::service::DEFAULT_THRESHOLD;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::path::Path;
use tabled::Tabled;

use super::problem_rows;
use crate::client::{ApiClient, ApiRejection, ErrorDetail, PredictionResponse, SchemaInfo};
use crate::output::{
    color_probability, label_name, print_error, print_info, print_json,
    print_table, OutputFormat,
};

/// Representative record used by `--sample`
pub fn sample_record() -> Map<String, Value> {
    [
        ("HighBP", 1.0),
        ("HighChol", 0.0),
        ("CholCheck", 1.0),
        ("BMI", 26.0),
        ("Smoker", 0.0),
        ("Stroke", 0.0),
        ("HeartDiseaseorAttack", 0.0),
        ("PhysActivity", 1.0),
        ("Fruits", 0.0),
        ("Veggies", 1.0),
        ("HvyAlcoholConsump", 0.0),
        ("AnyHealthcare", 1.0),
        ("NoDocbcCost", 0.0),
        ("GenHlth", 3.0),
        ("MentHlth", 5.0),
        ("PhysHlth", 30.0),
        ("DiffWalk", 0.0),
        ("Sex", 1.0),
        ("Age", 4.0),
        ("Education", 6.0),
        ("Income", 8.0),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), Value::from(value)))
    .collect()
}

/// Read a JSON object from disk
pub fn read_record(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).context("Record file is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Record must be a JSON object, got {}", type_name(&other)),
    }
}

/// Apply `NAME=VALUE` overrides; numeric values are sent as numbers
pub fn apply_overrides(record: &mut Map<String, Value>, overrides: &[String]) -> Result<()> {
    for item in overrides {
        let (name, raw) = item
            .split_once('=')
            .with_context(|| format!("Override '{}' is not NAME=VALUE", item))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Override '{}' has an empty field name", item);
        }
        let raw = raw.trim();
        let value = raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string()));
        record.insert(name.to_string(), value);
    }
    Ok(())
}

/// Assemble the record from a file, the sample, or overrides alone
pub fn build_record(
    file: Option<&Path>,
    sample: bool,
    overrides: &[String],
) -> Result<Map<String, Value>> {
    let mut record = match (file, sample) {
        (Some(path), _) => read_record(path)?,
        (None, true) => sample_record(),
        (None, false) if !overrides.is_empty() => Map::new(),
        (None, false) => anyhow::bail!("Provide --file, --sample or at least one --set"),
    };
    apply_overrides(&mut record, overrides)?;
    Ok(record)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Tabled, Serialize)]
struct PredictionRow {
    #[tabled(rename = "Probability")]
    probability: String,
    #[tabled(rename = "Label")]
    label: String,
}

/// Label and threshold to display for a prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub label: u8,
    pub threshold: f64,
    pub note: Option<String>,
}

/// Interpret a response against the threshold the server is deployed with
///
/// A label sent by the server is shown as is. Otherwise it is derived from the
/// threshold in `/schema`, or from the default threshold if that is unreachable.
pub async fn read_prediction(client: &ApiClient, response: &PredictionResponse) -> Reading {
    let served = client
        .get::<SchemaInfo>("schema")
        .await
        .ok()
        .map(|schema| schema.threshold);
    let threshold = served.unwrap_or(DEFAULT_THRESHOLD);

    match response.diabetes_label {
        Some(label) => Reading {
            label,
            threshold,
            note: None,
        },
        None => Reading {
            label: u8::from(response.diabetes_binary >= threshold),
            threshold,
            note: Some(match served {
                Some(t) => format!("label derived at server threshold {}", t),
                None => format!(
                    "server threshold unavailable; label derived at default threshold {}",
                    DEFAULT_THRESHOLD
                ),
            }),
        },
    }
}

/// Send one record to the server and print the outcome
pub async fn predict(
    client: &ApiClient,
    file: Option<&Path>,
    sample: bool,
    overrides: &[String],
    format: OutputFormat,
) -> Result<()> {
    let record = build_record(file, sample, overrides)?;

    let response = match client.predict(&record).await {
        Ok(response) => response,
        Err(err) => {
            if let Some(rejection) = err.downcast_ref::<ApiRejection>() {
                print_rejection(&rejection.detail, format);
            }
            return Err(err.context("Prediction failed"));
        }
    };

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            let reading = read_prediction(client, &response).await;

            let row = PredictionRow {
                probability: color_probability(response.diabetes_binary, reading.threshold),
                label: format!("{} ({})", reading.label, label_name(reading.label)),
            };
            println!("{}", "Prediction".bold());
            print_table(&[row], format);
            if let Some(note) = &reading.note {
                print_info(note);
            }
        }
    }

    Ok(())
}

fn print_rejection(detail: &ErrorDetail, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(detail),
        OutputFormat::Table => {
            print_error(&format!("{} [{}]", detail.message, detail.code));
            if let Some(payload) = &detail.payload {
                print_error(&format!("payload: {}", payload));
            }
            let rows = problem_rows(
                &detail.missing_fields,
                &detail.unexpected_fields,
                &detail.type_errors,
            );
            if !rows.is_empty() {
                print_table(&rows, format);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predictor_lib::{FeatureSchema, Validator};
    use std::io::Write;

    #[test]
    fn test_sample_record_is_valid() {
        let validator = Validator::new(FeatureSchema::diabetes_indicators());
        let features = validator.validate(&sample_record()).unwrap();
        assert_eq!(features.len(), 21);
    }

    #[test]
    fn test_overrides_replace_and_add() {
        let mut record = sample_record();
        apply_overrides(
            &mut record,
            &["BMI=31.5".to_string(), "Income = high".to_string()],
        )
        .unwrap();
        assert_eq!(record["BMI"], Value::from(31.5));
        assert_eq!(record["Income"], Value::String("high".to_string()));
    }

    #[test]
    fn test_malformed_override() {
        let mut record = Map::new();
        assert!(apply_overrides(&mut record, &["BMI".to_string()]).is_err());
        assert!(apply_overrides(&mut record, &["=3".to_string()]).is_err());
    }

    #[test]
    fn test_build_record_requires_a_source() {
        assert!(build_record(None, false, &[]).is_err());
        let record = build_record(None, false, &["Age=4".to_string()]).unwrap();
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_read_record_rejects_non_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[1, 2, 3]").unwrap();
        let err = read_record(file.path()).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_file_takes_precedence_over_sample() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"BMI": 40}"#).unwrap();
        let record = build_record(Some(file.path()), true, &[]).unwrap();
        assert_eq!(record.len(), 1);
    }

    async fn mock_schema(server: &mut mockito::Server, threshold: f64) -> mockito::Mock {
        server
            .mock("GET", "/schema")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "fields": ["HighBP"],
                    "threshold": threshold,
                    "model_version": "v1"
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    fn response(p: f64, label: Option<u8>) -> PredictionResponse {
        PredictionResponse {
            diabetes_binary: p,
            diabetes_label: label,
        }
    }

    #[tokio::test]
    async fn test_label_uses_served_threshold() {
        let mut server = mockito::Server::new_async().await;
        let schema = mock_schema(&mut server, 0.3).await;
        let client = ApiClient::new(&server.url()).unwrap();

        let reading = read_prediction(&client, &response(0.4, None)).await;

        assert_eq!(reading.label, 1);
        assert_eq!(reading.threshold, 0.3);
        assert!(reading.note.unwrap().contains("server threshold 0.3"));
        schema.assert_async().await;
    }

    #[tokio::test]
    async fn test_label_falls_back_to_default_threshold() {
        let mut server = mockito::Server::new_async().await;
        let _schema = server
            .mock("GET", "/schema")
            .with_status(500)
            .create_async()
            .await;
        let client = ApiClient::new(&server.url()).unwrap();

        let reading = read_prediction(&client, &response(0.4, None)).await;

        assert_eq!(reading.label, 0);
        assert_eq!(reading.threshold, DEFAULT_THRESHOLD);
        assert!(reading.note.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_server_label_is_kept() {
        let mut server = mockito::Server::new_async().await;
        let _schema = mock_schema(&mut server, 0.9).await;
        let client = ApiClient::new(&server.url()).unwrap();

        let reading = read_prediction(&client, &response(0.4, Some(1))).await;

        assert_eq!(reading.label, 1);
        assert_eq!(reading.threshold, 0.9);
        assert!(reading.note.is_none());
    }
}
