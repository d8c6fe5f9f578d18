//! npm registry client: maintainer package search and rate-limited download counts.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::period::Period;
use crate::pipeline::DownloadSource;
use crate::{Result, StatsError};

pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";
pub const NPM_API_URL: &str = "https://api.npmjs.org";

/// Enforced pause after every successful request.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(2);
pub const SEARCH_PAGE_SIZE: u32 = 250;
/// Most package names the download-point API accepts in one bulk query.
pub const BULK_QUERY_LIMIT: usize = 128;

/// Maintained packages, split by how their downloads must be queried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageSet {
    /// Queried in comma-separated batches.
    pub unscoped: Vec<String>,
    /// `@scope/name` packages; the bulk API rejects them, so one call each.
    pub scoped: Vec<String>,
}

impl PackageSet {
    pub fn len(&self) -> usize {
        self.unscoped.len() + self.scoped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Into<String>> FromIterator<S> for PackageSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PackageSet::default();
        for name in iter {
            let name = name.into();
            if name.starts_with('@') {
                set.scoped.push(name);
            } else {
                set.unscoped.push(name);
            }
        }
        set
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    package: SearchPackage,
}

#[derive(Deserialize)]
struct SearchPackage {
    name: String,
}

#[derive(Deserialize)]
struct DownloadPoint {
    downloads: u64,
}

#[derive(Debug, Clone)]
pub struct NpmClient {
    http: Client,
    registry_url: String,
    api_url: String,
    maintainer: String,
    request_interval: Duration,
}

impl NpmClient {
    pub fn new(maintainer: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("profilestats/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StatsError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            registry_url: NPM_REGISTRY_URL.to_string(),
            api_url: NPM_API_URL.to_string(),
            maintainer: maintainer.into(),
            request_interval: MIN_REQUEST_INTERVAL,
        })
    }

    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// GET `url`, honouring a single `Retry-After` on HTTP 429.
    async fn get_json<T: DeserializeOwned>(&self, context: &str, url: &str) -> Result<T> {
        match self.get_json_once(context, url).await {
            Err(StatsError::RateLimited { retry_after, .. }) => {
                warn!(
                    retry_after_secs = retry_after.as_secs(),
                    "rate limited while fetching {}, waiting before retrying", context
                );
                tokio::time::sleep(retry_after + self.request_interval).await;

                match self.get_json_once(context, url).await {
                    Err(StatsError::RateLimited { .. }) => Err(StatsError::upstream(
                        context,
                        format!("{} after retrying", StatusCode::TOO_MANY_REQUESTS),
                    )),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn get_json_once<T: DeserializeOwned>(&self, context: &str, url: &str) -> Result<T> {
        debug!(%url, "npm request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StatsError::network(context, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0);

            return Err(match retry_after {
                Some(secs) => StatsError::RateLimited {
                    context: context.to_string(),
                    retry_after: Duration::from_secs(secs),
                },
                None => StatsError::upstream(
                    context,
                    format!("{} without a valid 'Retry-After' header", status),
                ),
            });
        }
        if !status.is_success() {
            return Err(StatsError::upstream(context, status));
        }

        let body = response
            .json()
            .await
            .map_err(|e| StatsError::invalid_payload(context, e.to_string()))?;

        tokio::time::sleep(self.request_interval).await;
        Ok(body)
    }

    /// Downloads of `names` over `range`, summed. Unknown packages count as 0.
    async fn fetch_downloads(&self, range: &str, names: &[String]) -> Result<u64> {
        let joined = names.join(",");
        let context = match names {
            [single] => format!("npm downloads for {} (range: {})", single, range),
            [first, rest @ ..] => format!(
                "npm downloads for {} and {} more (range: {})",
                first,
                rest.len(),
                range
            ),
            [] => return Ok(0),
        };
        info!(packages = names.len(), %range, "fetching npm downloads");

        let url = format!("{}/downloads/point/{}/{}", self.api_url, range, joined);

        // A single-package response is the bare point, not a name-keyed map.
        if names.len() == 1 {
            let point: Option<DownloadPoint> = self.get_json(&context, &url).await?;
            return Ok(point.map_or(0, |point| point.downloads));
        }

        let points: HashMap<String, Option<DownloadPoint>> = self.get_json(&context, &url).await?;
        Ok(names
            .iter()
            .filter_map(|name| points.get(name).and_then(Option::as_ref))
            .map(|point| point.downloads)
            .sum())
    }
}

#[async_trait]
impl DownloadSource for NpmClient {
    async fn maintainer_packages(&self) -> Result<PackageSet> {
        let context = format!("npm packages of maintainer '{}'", self.maintainer);
        info!(maintainer = %self.maintainer, "fetching npm packages");

        let url = reqwest::Url::parse_with_params(
            &format!("{}/-/v1/search", self.registry_url),
            &[
                ("size", SEARCH_PAGE_SIZE.to_string()),
                ("text", format!("maintainer:{}", self.maintainer)),
            ],
        )
        .map_err(|e| StatsError::Configuration(format!("invalid npm registry URL: {}", e)))?;

        let response: SearchResponse = self.get_json(&context, url.as_str()).await?;
        Ok(response
            .objects
            .into_iter()
            .map(|result| result.package.name)
            .collect())
    }

    async fn period_downloads(&self, packages: &PackageSet, period: &Period) -> Result<u64> {
        let range = period.range();
        let mut total = 0;

        for chunk in packages.unscoped.chunks(BULK_QUERY_LIMIT) {
            total += self.fetch_downloads(&range, chunk).await?;
        }
        for name in &packages.scoped {
            total += self
                .fetch_downloads(&range, std::slice::from_ref(name))
                .await?;
        }

        Ok(total)
    }
}
