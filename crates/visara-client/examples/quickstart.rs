//! Minimal end-to-end walkthrough of the Visara client.
//!
//! Reads credentials from the environment (or a `.env` file):
//!
//! ```bash
//! VISARA_API_KEY=... VISARA_API_SECRET=... cargo run --example quickstart
//! ```

use anyhow::Result;
use visara_client::VisaraClient;
use visara_core::SearchOperator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visara_client=info".into()),
        )
        .init();

    let client = VisaraClient::from_env()?;

    let health = client.healthcheck().await?;
    println!("healthcheck: {health}");

    let datasets = client.list_datasets().await?;
    println!("{} datasets visible", datasets.len());
    for record in &datasets {
        println!(
            "  {}  {:<30}  {}",
            record.id,
            record.display_name.as_deref().unwrap_or("-"),
            record.status
        );
    }

    let Some(ready) = datasets.iter().find(|record| record.is_exportable()) else {
        println!("no exportable dataset available, stopping here");
        return Ok(());
    };

    let dataset = client.dataset(ready.id).await?;
    println!("searching {dataset} for cats");

    let query = dataset
        .searchable()
        .search_by_labels(&["cat".to_string()], SearchOperator::IsOneOf)
        .await?;
    let results = query.get_results().await?;
    println!("{} matching media items", results.len());
    for row in results.iter().take(10) {
        println!("  {}  labels: {}", row.media_id, row.image_labels);
    }

    Ok(())
}
