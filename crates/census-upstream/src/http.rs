//! REST gateway client.
//!
//! Talks to a gateway that fronts the management API with one collection per
//! resource kind:
//!
//! ```text
//! GET {base}/compartments?parentId={root}&subtree=true[&page=..]
//! GET {base}/{dbHomes|databases|dbSystems|cloudExadataInfrastructures}?parentId=..&compartmentId=..[&page=..]
//! GET {base}/backups?parentId=..&compartmentId=..[&page=..]
//! GET {base}/maintenanceRuns?targetResourceId=..&compartmentId=..[&page=..]
//! ```
//!
//! Bodies are JSON arrays; the continuation token travels in the
//! `opc-next-page` response header. Request signing is the gateway's concern;
//! an optional bearer token is forwarded as-is.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{Page, RawBackup, RawMaintenanceRun, RawResource, ResourceKind, UpstreamApi};
use crate::error::UpstreamError;
use crate::UpstreamResult;

/// Response header carrying the next page token.
pub const NEXT_PAGE_HEADER: &str = "opc-next-page";

/// Connection settings for [`HttpUpstream`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpUpstreamConfig {
    /// Gateway base URL, without trailing slash
    pub base_url: String,
    /// Bearer token, if the gateway wants one
    #[serde(default)]
    pub token: Option<String>,
    /// Per-request timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Page size requested from the gateway
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_page_limit() -> u32 {
    100
}

impl HttpUpstreamConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            timeout_ms: default_timeout_ms(),
            page_limit: default_page_limit(),
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// [`UpstreamApi`] over HTTP.
pub struct HttpUpstream {
    config: HttpUpstreamConfig,
    http_client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(config: HttpUpstreamConfig) -> UpstreamResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("backup-census/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(HttpUpstream {
            config,
            http_client,
        })
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &[(&str, &str)],
        page: Option<&str>,
    ) -> UpstreamResult<Page<T>> {
        let url = format!("{}/{}", self.config.base_url, collection);
        let limit = self.config.page_limit.to_string();

        let mut request = self
            .http_client
            .get(&url)
            .query(query)
            .query(&[("limit", limit.as_str())]);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::from_http(status.as_u16(), body));
        }

        let next_page = response
            .headers()
            .get(NEXT_PAGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let items: Vec<T> = response.json().await?;

        debug!(
            url = %url,
            items = items.len(),
            has_next = next_page.is_some(),
            "fetched page"
        );
        Ok(Page { items, next_page })
    }
}

#[async_trait]
impl UpstreamApi for HttpUpstream {
    async fn list_compartments(
        &self,
        root_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>> {
        self.get_page(
            ResourceKind::Compartment.collection(),
            &[("parentId", root_id), ("subtree", "true")],
            page,
        )
        .await
    }

    async fn list_child_resources(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>> {
        self.get_page(
            kind.collection(),
            &[("parentId", parent_id), ("compartmentId", compartment_id)],
            page,
        )
        .await
    }

    async fn list_leaf_records(
        &self,
        parent_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawBackup>> {
        self.get_page(
            "backups",
            &[("parentId", parent_id), ("compartmentId", compartment_id)],
            page,
        )
        .await
    }

    async fn list_maintenance_runs(
        &self,
        target_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawMaintenanceRun>> {
        self.get_page(
            "maintenanceRuns",
            &[("targetResourceId", target_id), ("compartmentId", compartment_id)],
            page,
        )
        .await
    }
}
