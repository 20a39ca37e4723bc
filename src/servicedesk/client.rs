//! Service-desk incident listing.
//!
//! A single authenticated GET against the incidents-by-view endpoint.
//! There is no retry and no pagination loop: a non-200 answer ends the
//! operation with [`TallyError::Http`].

use crate::config::ServiceDeskConfig;
use crate::error::{TallyError, TallyResult};
use crate::models::Incident;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

/// Sort field accepted by the listing endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Id,
    LastUpdate,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Id => "id",
            SortBy::LastUpdate => "last_update",
        }
    }
}

/// Sort direction accepted by the listing endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Asc => "asc",
            OrderBy::Desc => "desc",
        }
    }
}

/// Query parameters for one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentQuery {
    pub view_id: u64,
    pub sort_by: SortBy,
    pub order_by: OrderBy,
    pub page_key: Option<String>,
}

impl IncidentQuery {
    /// Query-string pairs; `page_key` is left out when unset.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("view_id", self.view_id.to_string()),
            ("sort_by", self.sort_by.as_str().to_string()),
        ];
        if let Some(ref page_key) = self.page_key {
            params.push(("page_key", page_key.clone()));
        }
        params.push(("order_by", self.order_by.as_str().to_string()));
        params
    }
}

/// Basic-auth credentials. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// HTTP client for the incidents-by-view endpoint.
pub struct ServiceDeskClient {
    http_client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl ServiceDeskClient {
    /// Create a client with a request timeout.
    pub fn new(endpoint: &str, credentials: Credentials, timeout_seconds: u64) -> TallyResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self::with_http_client(http_client, endpoint, credentials))
    }

    /// Create a client around an already configured `reqwest::Client`.
    pub fn with_http_client(
        http_client: reqwest::Client,
        endpoint: &str,
        credentials: Credentials,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.to_string(),
            credentials,
        }
    }

    /// Build a client and query from configuration plus an externally
    /// supplied password.
    pub fn from_config(
        config: &ServiceDeskConfig,
        password: Option<String>,
    ) -> TallyResult<(Self, IncidentQuery)> {
        let username = config.username.clone().ok_or_else(|| {
            TallyError::Config(
                "service-desk username missing: set SERVICE_DESK_USER or service_desk.username"
                    .to_string(),
            )
        })?;
        let password = password.ok_or_else(|| {
            TallyError::Config("service-desk password missing: set SERVICE_DESK_PASSWORD".to_string())
        })?;
        let view_id = config.view_id.ok_or_else(|| {
            TallyError::Config(
                "view id missing: pass --view-id or set service_desk.view_id".to_string(),
            )
        })?;

        let client = Self::new(
            &config.url,
            Credentials { username, password },
            config.timeout_seconds,
        )?;
        let query = IncidentQuery {
            view_id,
            sort_by: config.sort_by,
            order_by: config.order_by,
            page_key: config.page_key.clone(),
        };

        Ok((client, query))
    }

    /// Fetch the incidents of one view.
    pub async fn list_incidents(&self, query: &IncidentQuery) -> TallyResult<Vec<Incident>> {
        info!("Listing incidents for view {} from {}", query.view_id, self.endpoint);
        debug!("Query: {:?}", query);

        let response = self
            .http_client
            .get(&self.endpoint)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .query(&query.to_params())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TallyError::Http {
                status: status.as_u16(),
            });
        }

        let incidents: Vec<Incident> = response.json().await?;
        info!("Received {} incidents", incidents.len());
        Ok(incidents)
    }
}

/// Console lines for a successful listing.
pub fn incident_lines(incidents: &[Incident]) -> Vec<String> {
    incidents
        .iter()
        .map(|incident| format!("ID: {}, Title: {}", incident.id, incident.title))
        .collect()
}

/// Print the outcome of a listing. Returns the process exit code.
///
/// A non-200 status prints exactly one `Error: <status>` line; other
/// failures are passed back to the caller.
pub fn write_listing<W: Write>(
    out: &mut W,
    result: TallyResult<Vec<Incident>>,
) -> anyhow::Result<i32> {
    match result {
        Ok(incidents) => {
            for line in incident_lines(&incidents) {
                writeln!(out, "{}", line)?;
            }
            Ok(0)
        }
        Err(TallyError::Http { status }) => {
            writeln!(out, "Error: {}", status)?;
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
