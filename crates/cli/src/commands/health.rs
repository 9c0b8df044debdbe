//! Server health commands

use anyhow::Result;
use colored::Colorize;
use predictor_lib::{ComponentStatus, HealthResponse, ReadinessResponse};
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_table, print_warning, OutputFormat};

#[derive(Tabled, Serialize)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct HealthReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

fn status_name(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "healthy",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "unhealthy",
    }
}

/// Show liveness and readiness of the server
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthResponse) = client.probe("healthz").await?;
    let (_, readiness): (_, ReadinessResponse) = client.probe("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&HealthReport {
            health: health.clone(),
            readiness: readiness.clone(),
        }),
        OutputFormat::Table => {
            println!("{}", "Server Health".bold());
            println!("{}", "=".repeat(40));
            println!("Status: {}", color_status(status_name(health.status)));

            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Ready:  {}", color_status(ready));
            if let Some(version) = &readiness.model_version {
                println!("Model:  {}", version.cyan());
            }
            if let Some(reason) = &readiness.reason {
                print_warning(reason);
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(status_name(component.status)),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    if !health.status.is_operational() || !readiness.ready {
        anyhow::bail!("Server is not ready to serve predictions");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn mock_probe(server: &mut mockito::Server, path: &str, status: usize, body: &str) -> mockito::Mock {
        server
            .mock("GET", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_ready_server_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let _h = mock_probe(
            &mut server,
            "/healthz",
            200,
            r#"{"status":"healthy","components":{"classifier":{"status":"healthy","last_check_timestamp":1}}}"#,
        )
        .await;
        let _r = mock_probe(&mut server, "/readyz", 200, r#"{"ready":true}"#).await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert!(show_health(&client, OutputFormat::Json).await.is_ok());
    }

    #[tokio::test]
    async fn test_unready_server_fails() {
        let mut server = mockito::Server::new_async().await;
        let _h = mock_probe(
            &mut server,
            "/healthz",
            200,
            r#"{"status":"degraded","components":{"classifier":{"status":"degraded","message":"inference failing","last_check_timestamp":1}}}"#,
        )
        .await;
        let _r = mock_probe(
            &mut server,
            "/readyz",
            503,
            r#"{"ready":false,"reason":"Model not yet loaded"}"#,
        )
        .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert!(show_health(&client, OutputFormat::Table).await.is_err());
    }
}
