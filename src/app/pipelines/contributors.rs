use crate::adapters::graphql::GraphQlClient;
use crate::config::toml_config::HarvestConfig;
use crate::core::output::Exporter;
use crate::core::pagination::{collect_all, CursorPage, CursorSource, PaginationLimits};
use crate::domain::model::{ContributorRecord, RepositoryId, TransformResult};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{HarvestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 預設查詢；自訂查詢必須把連線取別名為 `contributors`
///
/// 貢獻數是該使用者過去一年在這個儲存庫的 commit 數。
pub const CONTRIBUTORS_QUERY: &str = r#"
query Contributors($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    contributors: mentionableUsers(first: $first, after: $after) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        login
        email
        contributionsCollection {
          commitContributionsByRepository(maxRepositories: 100) {
            repository {
              nameWithOwner
            }
            contributions {
              totalCount
            }
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Serialize)]
struct Variables<'a> {
    owner: &'a str,
    name: &'a str,
    first: usize,
    after: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ContributorsData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    contributors: Connection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<ContributorNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributorNode {
    login: String,
    email: Option<String>,
    contribution_count: Option<u64>,
    contributions_collection: Option<ContributionsCollection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    #[serde(default)]
    commit_contributions_by_repository: Vec<RepositoryContributions>,
}

#[derive(Debug, Deserialize)]
struct RepositoryContributions {
    repository: NamedRepository,
    contributions: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamedRepository {
    name_with_owner: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

impl ContributorNode {
    /// 自訂查詢直接給 `contributionCount` 時優先使用；其他儲存庫的 commit 不計入
    fn into_record(self, repository: &RepositoryId) -> ContributorRecord {
        let ContributorNode {
            login,
            email,
            contribution_count,
            contributions_collection,
        } = self;

        let name = repository.to_string();
        let contribution_count = contribution_count
            .or_else(|| {
                contributions_collection?
                    .commit_contributions_by_repository
                    .into_iter()
                    .find(|entry| entry.repository.name_with_owner.eq_ignore_ascii_case(&name))
                    .map(|entry| entry.contributions.total_count)
            })
            .unwrap_or(0);

        ContributorRecord {
            handle: login,
            email: email.filter(|email| !email.trim().is_empty()),
            contribution_count,
        }
    }
}

/// 一個儲存庫的貢獻者連線
pub struct ContributorSource {
    client: GraphQlClient,
    repository: RepositoryId,
    query: String,
    page_size: usize,
}

impl ContributorSource {
    pub fn new(client: GraphQlClient, repository: RepositoryId, page_size: usize) -> Self {
        Self {
            client,
            repository,
            query: CONTRIBUTORS_QUERY.to_string(),
            page_size,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn repository(&self) -> &RepositoryId {
        &self.repository
    }
}

#[async_trait]
impl CursorSource for ContributorSource {
    type Item = ContributorRecord;

    async fn fetch_page(&self, after: Option<&str>) -> Result<CursorPage<ContributorRecord>> {
        let variables = Variables {
            owner: &self.repository.owner,
            name: &self.repository.name,
            first: self.page_size,
            after,
        };
        tracing::debug!("Querying {} contributors after {:?}", self.repository, after);

        let data: ContributorsData = self.client.execute(&self.query, &variables).await?;
        let connection = data
            .repository
            .ok_or_else(|| {
                HarvestError::query(format!("repository {} not found", self.repository))
            })?
            .contributors;

        Ok(CursorPage {
            items: connection
                .nodes
                .into_iter()
                .flatten()
                .map(|node| node.into_record(&self.repository))
                .collect(),
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }
}

pub struct ContributorPipeline<S: Storage> {
    source: ContributorSource,
    limits: PaginationLimits,
    exporter: Exporter<S>,
}

impl<S: Storage> ContributorPipeline<S> {
    pub fn new(storage: S, config: &HarvestConfig, client: reqwest::Client) -> Result<Self> {
        let contributors = &config.contributors;
        let repository: RepositoryId = contributors
            .repository
            .as_deref()
            .ok_or_else(|| HarvestError::MissingConfigError {
                field: "contributors.repository".to_string(),
            })?
            .parse()?;
        let token = contributors
            .token
            .clone()
            .ok_or_else(|| HarvestError::auth("no access token configured (set GITHUB_TOKEN)"))?;

        let graphql = GraphQlClient::new(client, contributors.endpoint.clone(), token);
        let mut source = ContributorSource::new(graphql, repository, contributors.page_size);
        if let Some(query_file) = &contributors.query_file {
            tracing::info!("📝 Using custom query from {}", query_file);
            source = source.with_query(std::fs::read_to_string(query_file)?);
        }

        Ok(Self {
            source,
            limits: PaginationLimits {
                max_pages: contributors.max_pages,
                failure_policy: config.run.failure_policy,
            },
            exporter: Exporter::new(storage, config.output.clone()),
        })
    }

    fn file_stem(&self) -> String {
        let repository = self.source.repository();
        format!("{}_{}_contributors", repository.owner, repository.name)
    }
}

#[async_trait]
impl<S: Storage> Pipeline for ContributorPipeline<S> {
    type Item = ContributorRecord;

    fn name(&self) -> &str {
        "contributors"
    }

    async fn extract(&self) -> Result<Vec<ContributorRecord>> {
        tracing::info!("🔍 Collecting contributors of {}", self.source.repository());
        collect_all(&self.source, self.limits).await
    }

    async fn transform(&self, data: Vec<ContributorRecord>) -> Result<TransformResult<ContributorRecord>> {
        let source = self.source.repository().to_string();
        self.exporter.render(self.name(), &source, data)
    }

    async fn load(&self, result: &TransformResult<ContributorRecord>) -> Result<String> {
        self.exporter.write(&self.file_stem(), result).await
    }
}
