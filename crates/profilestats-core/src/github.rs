//! GitHub GraphQL client for the contribution calendar and repository languages.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::contributions::ContributionCalendar;
use crate::languages::{LanguageSize, RepositoryLanguages};
use crate::pipeline::{ContributionSource, LanguageSource};
use crate::{Result, StatsError};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Most recently pushed repositories considered for the language chart.
pub const REPOSITORY_PAGE_SIZE: u32 = 100;
/// Largest languages kept per repository.
pub const LANGUAGE_PAGE_SIZE: u32 = 10;

const CONTRIBUTIONS_QUERY: &str = r#"
query UserContributions($login: String!, $from: DateTime!, $to: DateTime!) {
  user(login: $login) {
    contributionsCollection(from: $from, to: $to) {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            contributionCount
            date
          }
        }
      }
    }
  }
}
"#;

const LANGUAGES_QUERY: &str = r#"
query UserLanguages($login: String!, $repositories: Int!, $languages: Int!) {
  user(login: $login) {
    repositoriesContributedTo(
      first: $repositories
      includeUserRepositories: true
      contributionTypes: [COMMIT, PULL_REQUEST, REPOSITORY]
      orderBy: { field: PUSHED_AT, direction: DESC }
    ) {
      nodes {
        nameWithOwner
        languages(first: $languages, orderBy: { field: SIZE, direction: DESC }) {
          edges {
            size
            node {
              name
            }
          }
        }
      }
    }
  }
}
"#;

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct UserData<T> {
    user: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsUser {
    contributions_collection: ContributionsCollection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: ContributionCalendar,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LanguagesUser {
    repositories_contributed_to: RepositoryConnection,
}

#[derive(Deserialize)]
struct RepositoryConnection {
    #[serde(default)]
    nodes: Vec<Option<RepositoryNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name_with_owner: String,
    languages: Option<LanguageConnection>,
}

#[derive(Deserialize)]
struct LanguageConnection {
    #[serde(default)]
    edges: Vec<Option<LanguageEdge>>,
}

#[derive(Deserialize)]
struct LanguageEdge {
    size: u64,
    node: LanguageNode,
}

#[derive(Deserialize)]
struct LanguageNode {
    name: String,
}

impl From<RepositoryNode> for RepositoryLanguages {
    fn from(node: RepositoryNode) -> Self {
        let languages = node
            .languages
            .map(|connection| connection.edges)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|edge| LanguageSize {
                name: edge.node.name,
                size: edge.size,
            })
            .collect();

        Self {
            repository: node.name_with_owner,
            languages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    login: String,
    token: String,
}

impl GitHubClient {
    pub fn new(login: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("profilestats/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StatsError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: GITHUB_API_URL.to_string(),
            login: login.into(),
            token: token.into(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn query<T: DeserializeOwned>(
        &self,
        context: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/graphql", self.api_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| StatsError::network(context, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::upstream(context, status));
        }

        let body: GraphQlResponse<UserData<T>> = response
            .json()
            .await
            .map_err(|e| StatsError::invalid_payload(context, e.to_string()))?;

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(StatsError::upstream(
                context,
                format!("GraphQL error ({})", messages.join("; ")),
            ));
        }

        body.data
            .and_then(|data| data.user)
            .ok_or_else(|| StatsError::upstream(context, format!("unknown user '{}'", self.login)))
    }
}

fn graphql_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl ContributionSource for GitHubClient {
    async fn contribution_calendar(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ContributionCalendar> {
        let from = graphql_instant(from);
        let to = graphql_instant(to);
        info!(login = %self.login, %from, %to, "fetching GitHub contributions");

        let user: ContributionsUser = self
            .query(
                "GitHub user data",
                CONTRIBUTIONS_QUERY,
                json!({ "login": self.login, "from": from, "to": to }),
            )
            .await?;

        Ok(user.contributions_collection.contribution_calendar)
    }
}

#[async_trait]
impl LanguageSource for GitHubClient {
    async fn repository_languages(&self) -> Result<Vec<RepositoryLanguages>> {
        info!(login = %self.login, "fetching GitHub languages");

        let user: LanguagesUser = self
            .query(
                "GitHub user languages",
                LANGUAGES_QUERY,
                json!({
                    "login": self.login,
                    "repositories": REPOSITORY_PAGE_SIZE,
                    "languages": LANGUAGE_PAGE_SIZE,
                }),
            )
            .await?;

        Ok(user
            .repositories_contributed_to
            .nodes
            .into_iter()
            .flatten()
            .map(RepositoryLanguages::from)
            .collect())
    }
}
