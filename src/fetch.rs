use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::SourceConfig;

pub const DEFAULT_BASE_URL: &str = "https://arxiv.org";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw listing markup for one source. `ok == false` means the body is empty
/// and the source contributes nothing to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub body: String,
    pub ok: bool,
}

impl FetchOutcome {
    pub fn success(body: String) -> Self {
        FetchOutcome { body, ok: true }
    }

    pub fn failed() -> Self {
        FetchOutcome {
            body: String::new(),
            ok: false,
        }
    }
}

#[async_trait]
pub trait ListingFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> FetchOutcome;
}

/// Fetches `{base_url}/list/{name}/new` with a bounded request timeout.
/// No rate limiting here; spacing between sources is the caller's job.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scout/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn listing_url(&self, source: &SourceConfig) -> String {
        format!("{}/list/{}/new", self.base_url, source.name)
    }
}

#[async_trait]
impl ListingFetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceConfig) -> FetchOutcome {
        let url = self.listing_url(source);
        let start = Instant::now();

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(source = %source.name, error = %e, "fetch failed");
                return FetchOutcome::failed();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(source = %source.name, status = status.as_u16(), "non-success status");
            return FetchOutcome::failed();
        }

        match response.text().await {
            Ok(body) => {
                debug!(
                    source = %source.name,
                    bytes = body.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "fetched listing"
                );
                FetchOutcome::success(body)
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, "reading body failed");
                FetchOutcome::failed()
            }
        }
    }
}

// ── Tests ──
