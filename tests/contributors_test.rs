use contact_harvest::adapters::graphql::GraphQlClient;
use contact_harvest::app::pipelines::ContributorSource;
use contact_harvest::config::toml_config::OutputFormat;
use contact_harvest::core::pagination::{collect_all, PaginationLimits};
use contact_harvest::domain::model::RepositoryId;
use contact_harvest::{
    ContributorPipeline, ContributorRecord, EtlEngine, FailurePolicy, HarvestConfig, HarvestError,
    LocalStorage,
};
use httpmock::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn page(nodes: serde_json::Value, has_next: bool, cursor: Option<&str>) -> serde_json::Value {
    json!({
        "data": {
            "repository": {
                "contributors": {
                    "pageInfo": {"hasNextPage": has_next, "endCursor": cursor},
                    "nodes": nodes
                }
            }
        }
    })
}

fn commits(entries: &[(&str, u64)]) -> serde_json::Value {
    let by_repository: Vec<serde_json::Value> = entries
        .iter()
        .map(|(repo, count)| {
            json!({"repository": {"nameWithOwner": repo}, "contributions": {"totalCount": count}})
        })
        .collect();
    json!({"commitContributionsByRepository": by_repository})
}

/// 第一頁兩位（還有下一頁），第二頁一位（最後一頁）
fn mock_two_pages(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .header("authorization", "Bearer ghp_test")
            .json_body_partial(r#"{"variables": {"owner": "acme", "name": "widgets", "after": null}}"#);
        then.status(200).json_body(page(
            json!([
                {"login": "alice", "email": "alice@acme.dev", "contributionsCollection": commits(&[("alice/site", 500), ("acme/widgets", 40)])},
                {"login": "bob", "email": "", "contributionsCollection": commits(&[("acme/widgets", 3)])}
            ]),
            true,
            Some("cursor-1"),
        ));
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .json_body_partial(r#"{"variables": {"after": "cursor-1"}}"#);
        then.status(200).json_body(page(
            json!([
                {"login": "carol", "email": null, "contributionsCollection": commits(&[("acme/widgets", 1), ("acme/gears", 9)])}
            ]),
            false,
            Some("cursor-2"),
        ));
    });
    (first, second)
}

fn source(server: &MockServer) -> ContributorSource {
    let client = GraphQlClient::new(reqwest::Client::new(), server.url("/graphql"), "ghp_test");
    ContributorSource::new(client, "acme/widgets".parse::<RepositoryId>().unwrap(), 2)
}

fn abort_limits() -> PaginationLimits {
    PaginationLimits {
        max_pages: None,
        failure_policy: FailurePolicy::Abort,
    }
}

#[tokio::test]
async fn test_two_pages_yield_three_records_in_order() {
    let server = MockServer::start();
    let (first, second) = mock_two_pages(&server);

    // Abort 模式下，第三次查詢會打到沒有設定的路由而失敗
    let records = collect_all(&source(&server), abort_limits()).await.unwrap();

    first.assert_hits(1);
    second.assert_hits(1);
    assert_eq!(
        records,
        vec![
            ContributorRecord {
                handle: "alice".into(),
                email: Some("alice@acme.dev".into()),
                contribution_count: 40,
            },
            ContributorRecord {
                handle: "bob".into(),
                email: None,
                contribution_count: 3,
            },
            ContributorRecord {
                handle: "carol".into(),
                email: None,
                contribution_count: 1,
            },
        ]
    );
}

#[tokio::test]
async fn test_repeated_runs_yield_same_set() {
    let server = MockServer::start();
    let (first, second) = mock_two_pages(&server);
    let source = source(&server);

    let run_one: HashSet<ContributorRecord> = collect_all(&source, abort_limits())
        .await
        .unwrap()
        .into_iter()
        .collect();
    let run_two: HashSet<ContributorRecord> = collect_all(&source, abort_limits())
        .await
        .unwrap()
        .into_iter()
        .collect();

    first.assert_hits(2);
    second.assert_hits(2);
    assert_eq!(run_one, run_two);
    assert_eq!(run_one.len(), 3);
}

#[tokio::test]
async fn test_rate_limited_response_is_auth_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({
            "errors": [{"type": "RATE_LIMITED", "message": "API rate limit exceeded for user ID 1."}]
        }));
    });

    // Skip 模式也不會吞掉認證錯誤
    let result = collect_all(&source(&server), PaginationLimits::default()).await;
    assert!(matches!(result, Err(HarvestError::AuthError { .. })));
}

#[tokio::test]
async fn test_unknown_repository_is_query_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({
            "data": {"repository": null},
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a Repository with the name 'acme/widgets'."}]
        }));
    });

    let result = collect_all(&source(&server), abort_limits()).await;
    assert!(matches!(result, Err(HarvestError::QueryError { .. })));
}

#[tokio::test]
async fn test_pipeline_writes_outputs_with_custom_query() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let custom = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_contains("collaborators");
        then.status(200).json_body(page(
            json!([{"login": "dave", "email": "dave@acme.dev", "contributionCount": 9}]),
            false,
            None,
        ));
    });

    let mut query_file = NamedTempFile::new()?;
    write!(
        query_file,
        "query($owner: String!, $name: String!, $first: Int!, $after: String) {{ repository(owner: $owner, name: $name) {{ contributors: collaborators(first: $first, after: $after) {{ pageInfo {{ hasNextPage endCursor }} nodes {{ login email }} }} }} }}"
    )?;

    let mut config = HarvestConfig::default();
    config.contributors.repository = Some("acme/widgets".to_string());
    config.contributors.token = Some("ghp_test".to_string());
    config.contributors.endpoint = server.url("/graphql");
    config.contributors.query_file = Some(query_file.path().display().to_string());
    config.output.path = temp_dir.path().display().to_string();
    config.output.formats = vec![OutputFormat::Tsv];
    config.output.stdout = false;

    let pipeline = ContributorPipeline::new(
        LocalStorage::new(config.output.path.clone()),
        &config,
        reqwest::Client::new(),
    )?;
    let report = EtlEngine::new(pipeline).run().await?;

    custom.assert_hits(1);
    assert_eq!(report.summary.total_records, 1);
    assert_eq!(report.summary.email_domains, vec![("acme.dev".to_string(), 1)]);

    let tsv = std::fs::read_to_string(temp_dir.path().join("acme_widgets_contributors.tsv"))?;
    assert_eq!(tsv, "handle\temail\tcontribution_count\ndave\tdave@acme.dev\t9\n");
    Ok(())
}
