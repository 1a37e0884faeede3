//! End-to-end tests against a running deployment
//!
//! These tests require:
//! 1. API server running on the configured port
//! 2. Worker process running with a reachable explainability engine
//! 3. PostgreSQL, Redis and R2 configured for both
//!
//! Run with: cargo test --test e2e_test -- --ignored --nocapture
//!
//! Set API_BASE_URL to override default (http://localhost:3000) and
//! E2E_IMAGE_URL to choose the analysed image.

use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: Uuid,
    status: String,
}

fn get_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Poll until the job leaves `processing` (with timeout)
async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    owner_id: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/api/v1/explain/{}/{}", base_url, owner_id, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let body: serde_json::Value = response.json().await?;
        match body["status"].as_str() {
            Some("completed") | Some("failed") => return Ok(body),
            Some("processing") => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!("  ... still waiting (attempt {}/{})", attempt, max_attempts);
                }
                sleep(Duration::from_millis(500)).await;
            }
            other => return Err(format!("Unknown job status: {:?}", other).into()),
        }
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}

#[tokio::test]
#[ignore] // Requires running API server, worker, and all infrastructure
async fn test_e2e_health_check() {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", get_base_url()))
        .send()
        .await
        .expect("Health check failed");

    assert!(
        response.status().is_success(),
        "Health check returned non-success status: {}",
        response.status()
    );
}

#[tokio::test]
#[ignore] // Requires running API server, worker, and all infrastructure
async fn test_e2e_explain_job_lifecycle() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();
    let owner_id = format!("e2e-{}", Uuid::new_v4());
    let image_url = std::env::var("E2E_IMAGE_URL")
        .unwrap_or_else(|_| "https://upload.wikimedia.org/wikipedia/commons/4/47/PNG_transparency_demonstration_1.png".to_string());

    let response = client
        .post(format!("{}/api/v1/explain", base_url))
        .json(&serde_json::json!({ "owner_id": owner_id, "image_url": image_url }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(response.status().as_u16(), 202);
    let submitted: SubmitResponse = response.json().await.expect("Bad submit response");
    assert_eq!(submitted.status, "processing");

    let body = poll_job_status(&client, &base_url, &owner_id, submitted.job_id, 600)
        .await
        .expect("Job never finished");
    println!("Final status: {}", body);

    // A second poll returns the same terminal state.
    let again: serde_json::Value = client
        .get(format!("{}/api/v1/explain/{}/{}", base_url, owner_id, submitted.job_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again, body);

    let history: Vec<serde_json::Value> = client
        .get(format!("{}/api/v1/explain/{}", base_url, owner_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["job_id"], submitted.job_id.to_string());
}

#[tokio::test]
#[ignore] // Requires running API server
async fn test_e2e_unknown_job_is_404() {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/v1/explain/nobody/{}", get_base_url(), Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
