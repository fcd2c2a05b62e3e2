//! Smoke tests against a live Visara deployment.
//!
//! Disabled by default; they need real credentials and a reachable
//! deployment:
//!
//! ```bash
//! RUN_EXTERNAL_TESTS=1 \
//! VISARA_API_KEY=... \
//! VISARA_API_SECRET=... \
//! cargo test --package visara-client --features integration --test live_api_test -- --nocapture
//! ```

#![cfg(feature = "integration")]

use visara_client::VisaraClient;

/// Set RUN_EXTERNAL_TESTS=1 or RUN_EXTERNAL_TESTS=true to enable.
fn should_run_external_tests() -> bool {
    std::env::var("RUN_EXTERNAL_TESTS")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn skip_if_external_tests_disabled(test_name: &str) -> bool {
    if !should_run_external_tests() {
        println!("Skipping {test_name} - set RUN_EXTERNAL_TESTS=1 to enable live API tests");
        return true;
    }
    false
}

#[tokio::test]
async fn test_live_healthcheck() {
    if skip_if_external_tests_disabled("test_live_healthcheck") {
        return;
    }
    let client = VisaraClient::from_env().expect("VISARA_* credentials must be set");
    let body = client.healthcheck().await.expect("healthcheck failed");
    println!("healthcheck: {body}");
}

#[tokio::test]
async fn test_live_list_datasets() {
    if skip_if_external_tests_disabled("test_live_list_datasets") {
        return;
    }
    let client = VisaraClient::from_env().expect("VISARA_* credentials must be set");
    let datasets = client.list_datasets().await.expect("listing failed");
    println!("{} datasets visible", datasets.len());
    for dataset in datasets.iter().take(5) {
        println!(
            "  {} {} ({})",
            dataset.id,
            dataset.display_name.as_deref().unwrap_or("-"),
            dataset.status
        );
    }
}
