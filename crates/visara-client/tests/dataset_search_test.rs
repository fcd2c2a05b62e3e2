//! Dataset-level search wrappers: capability gating, client-side set
//! arithmetic for negation, and the union path for `one_of` over
//! captions and issues.

mod helpers;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{
    ids, manifest, mock_dataset_details, mock_full_export, mock_user_config, open_dataset,
    DATASET_ID,
};
use visara_core::{
    query_to_string, EntityType, Error, IssueMode, IssueType, Predicate, SearchOperator,
    SemanticRelevance,
};

fn submit_path() -> String {
    format!("/dataset/{DATASET_ID}/export_context_async")
}

/// Mount a submit mock that matches one exact query and completes at a
/// dedicated download path.
async fn mock_query_result(server: &MockServer, query: &[Predicate], download_path: &str, rows: &[&str]) {
    Mock::given(method("GET"))
        .and(path(submit_path()))
        .and(query_param("vql", query_to_string(query)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "task-1",
            "status": "COMPLETED",
            "download_uri": format!("{}{download_path}", server.uri())
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(download_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest(rows)))
        .mount(server)
        .await;
}

// =============================================================================
// Capability gating
// =============================================================================

#[tokio::test]
async fn test_disabled_label_search_returns_empty_without_searching() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    mock_user_config(&server, false, true, true).await;
    Mock::given(method("GET"))
        .and(path(submit_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dataset = open_dataset(&server).await;
    let rows = dataset
        .search_by_labels(
            &["cat".to_string()],
            EntityType::Images,
            SearchOperator::IsOneOf,
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_capabilities_fetched_once_per_handle() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    Mock::given(method("GET"))
        .and(path("/user_config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [{
                "feature_key": "TEXTUAL_SEARCH_IMAGE",
                "feature_options": {"labels_search": false, "captions_search": false, "semantic_search": false}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dataset = open_dataset(&server).await;
    for _ in 0..3 {
        let rows = dataset
            .search_by_labels(
                &["cat".to_string()],
                EntityType::Images,
                SearchOperator::IsOneOf,
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
    let caps = dataset.search_capabilities().await.unwrap();
    assert!(!caps.labels_enabled());
}

// =============================================================================
// Labels
// =============================================================================

#[tokio::test]
async fn test_label_is_not_subtracts_positive_matches_from_export() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    mock_user_config(&server, true, true, true).await;
    mock_full_export(&server, manifest(&["m-1", "m-2", "m-3", "m-4"])).await;

    let positive = [Predicate::labels(
        SearchOperator::Is,
        vec!["cat".to_string()],
    )];
    mock_query_result(&server, &positive, "/downloads/is", &["m-2", "m-3"]).await;

    let dataset = open_dataset(&server).await;
    let matching = dataset
        .search_by_labels(&["cat".to_string()], EntityType::Images, SearchOperator::Is)
        .await
        .unwrap();
    let complement = dataset
        .search_by_labels(
            &["cat".to_string()],
            EntityType::Images,
            SearchOperator::IsNot,
        )
        .await
        .unwrap();

    assert_eq!(ids(&matching), vec!["m-2", "m-3"]);
    assert_eq!(ids(&complement), vec!["m-1", "m-4"]);
    // Disjoint partition of the full export by media id.
    assert_eq!(matching.len() + complement.len(), 4);
}

#[tokio::test]
async fn test_label_is_not_one_of_subtracts_one_of_matches() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    mock_user_config(&server, true, true, true).await;
    mock_full_export(&server, manifest(&["m-1", "m-2", "m-3"])).await;

    let labels = vec!["cat".to_string(), "dog".to_string()];
    let positive = [Predicate::labels(SearchOperator::IsOneOf, labels.clone())];
    mock_query_result(&server, &positive, "/downloads/one-of", &["m-1"]).await;

    let dataset = open_dataset(&server).await;
    let complement = dataset
        .search_by_labels(&labels, EntityType::Images, SearchOperator::IsNotOneOf)
        .await
        .unwrap();
    assert_eq!(ids(&complement), vec!["m-2", "m-3"]);
}

#[tokio::test]
async fn test_label_negation_on_empty_export_is_empty() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "UPLOADING").await;
    mock_user_config(&server, true, true, true).await;

    let positive = [Predicate::labels(
        SearchOperator::Is,
        vec!["cat".to_string()],
    )];
    mock_query_result(&server, &positive, "/downloads/is", &["m-1"]).await;

    // Dataset is not exportable, so the full-export side yields nothing.
    let dataset = open_dataset(&server).await;
    let complement = dataset
        .search_by_labels(
            &["cat".to_string()],
            EntityType::Images,
            SearchOperator::IsNot,
        )
        .await
        .unwrap();
    assert!(complement.is_empty());
}

// =============================================================================
// Captions
// =============================================================================

#[tokio::test]
async fn test_caption_is_searches_space_joined_terms() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    mock_user_config(&server, true, true, true).await;

    let joined = [Predicate::caption("cat sitting")];
    mock_query_result(&server, &joined, "/downloads/joined", &["m-1"]).await;

    let dataset = open_dataset(&server).await;
    let rows = dataset
        .search_by_captions(
            &["cat".to_string(), "sitting".to_string()],
            EntityType::Images,
            SearchOperator::Is,
        )
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec!["m-1"]);
}

#[tokio::test]
async fn test_caption_one_of_unions_per_term_queries() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    mock_user_config(&server, true, true, true).await;

    mock_query_result(
        &server,
        &[Predicate::caption("cat")],
        "/downloads/cat",
        &["m-1", "m-2"],
    )
    .await;
    mock_query_result(
        &server,
        &[Predicate::caption("dog")],
        "/downloads/dog",
        &["m-2", "m-3"],
    )
    .await;

    let dataset = open_dataset(&server).await;
    let rows = dataset
        .search_by_captions(
            &["cat".to_string(), "dog".to_string()],
            EntityType::Images,
            SearchOperator::IsOneOf,
        )
        .await
        .unwrap();
    // Union deduplicated by media id, first occurrence kept.
    assert_eq!(ids(&rows), vec!["m-1", "m-2", "m-3"]);
}

#[tokio::test]
async fn test_caption_is_not_one_of_complements_the_union() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    mock_user_config(&server, true, true, true).await;
    mock_full_export(&server, manifest(&["m-1", "m-2", "m-3", "m-4"])).await;

    mock_query_result(
        &server,
        &[Predicate::caption("cat")],
        "/downloads/cat",
        &["m-1"],
    )
    .await;
    mock_query_result(
        &server,
        &[Predicate::caption("dog")],
        "/downloads/dog",
        &["m-3"],
    )
    .await;

    let dataset = open_dataset(&server).await;
    let terms = vec!["cat".to_string(), "dog".to_string()];
    let union = dataset
        .search_by_captions(&terms, EntityType::Images, SearchOperator::IsOneOf)
        .await
        .unwrap();
    let complement = dataset
        .search_by_captions(&terms, EntityType::Images, SearchOperator::IsNotOneOf)
        .await
        .unwrap();

    assert_eq!(ids(&complement), vec!["m-2", "m-4"]);
    assert_eq!(union.len() + complement.len(), 4);
}

// =============================================================================
// Issues
// =============================================================================

#[tokio::test]
async fn test_issue_is_sends_one_in_predicate_per_type() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;

    let expected = [
        Predicate::issue(IssueType::Blur, 0.5, 0.9, IssueMode::In),
        Predicate::issue(IssueType::Dark, 0.5, 0.9, IssueMode::In),
    ];
    mock_query_result(&server, &expected, "/downloads/issues", &["m-1"]).await;

    let dataset = open_dataset(&server).await;
    let rows = dataset
        .search_by_issues(
            &[IssueType::Blur, IssueType::Dark],
            EntityType::Images,
            SearchOperator::Is,
            0.5,
            0.9,
        )
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec!["m-1"]);
}

#[tokio::test]
async fn test_issue_is_not_one_of_uses_native_out_mode() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;

    let expected = [Predicate::issue(IssueType::Duplicates, 0.8, 1.0, IssueMode::Out)];
    mock_query_result(&server, &expected, "/downloads/out", &["m-2"]).await;
    // Native exclusion must not trigger a full export.
    Mock::given(method("GET"))
        .and(path(format!("/dataset/{DATASET_ID}/export")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dataset = open_dataset(&server).await;
    let rows = dataset
        .search_by_issues(
            &[IssueType::Duplicates],
            EntityType::Images,
            SearchOperator::IsNotOneOf,
            0.8,
            1.0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec!["m-2"]);
}

#[tokio::test]
async fn test_issue_one_of_unions_per_type_queries() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;

    mock_query_result(
        &server,
        &[Predicate::issue(IssueType::Blur, 0.8, 1.0, IssueMode::In)],
        "/downloads/blur",
        &["m-1", "m-2"],
    )
    .await;
    mock_query_result(
        &server,
        &[Predicate::issue(IssueType::Dark, 0.8, 1.0, IssueMode::In)],
        "/downloads/dark",
        &["m-2"],
    )
    .await;

    let dataset = open_dataset(&server).await;
    let rows = dataset
        .search_by_issues_default(
            &[IssueType::Blur, IssueType::Dark],
            EntityType::Images,
            SearchOperator::IsOneOf,
        )
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec!["m-1", "m-2"]);
}

#[tokio::test]
async fn test_issue_search_requires_types() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;

    let dataset = open_dataset(&server).await;
    let err = dataset
        .search_by_issues(&[], EntityType::Images, SearchOperator::Is, 0.8, 1.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

// =============================================================================
// Semantic and plain VQL
// =============================================================================

#[tokio::test]
async fn test_semantic_search_rejects_empty_text() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    mock_user_config(&server, true, true, true).await;

    let dataset = open_dataset(&server).await;
    let err = dataset
        .search_by_semantic("", EntityType::Images, SemanticRelevance::Medium)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_empty_vql_returns_empty_without_requests() {
    let server = MockServer::start().await;
    mock_dataset_details(&server, "READY").await;
    Mock::given(method("GET"))
        .and(path(submit_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dataset = open_dataset(&server).await;
    let rows = dataset.search_by_vql(&[], EntityType::Images).await.unwrap();
    assert!(rows.is_empty());
}
