use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::outbound::llm::http_client_builder;
use crate::core::error::{Error as CoreError, Result};
use crate::core::ports::{FetchedPage, SiteProbe};

const USER_AGENT: &str = "Mozilla/5.0";

/// DNS lookups through tokio and page fetches through reqwest.
///
/// Page bodies are read in chunks and cut off after `max_body_bytes`.
#[derive(Debug, Clone)]
pub struct HttpSiteProbe {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpSiteProbe {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Result<Self> {
        let client = http_client_builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| CoreError::Config(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

#[async_trait]
impl SiteProbe for HttpSiteProbe {
    async fn resolves(&self, hostname: &str) -> bool {
        // Url::host_str keeps the brackets around IPv6 literals.
        let host = hostname.trim_start_matches('[').trim_end_matches(']');
        match tokio::net::lookup_host((host, 80)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(err) => {
                tracing::debug!(hostname, error = %err, "hostname did not resolve");
                false
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| CoreError::Network(format!("GET {url} failed: {err}")))?;
        let status = response.status().as_u16();

        let mut bytes = Vec::new();
        while bytes.len() < self.max_body_bytes {
            let chunk = response
                .chunk()
                .await
                .map_err(|err| CoreError::Network(format!("reading {url} failed: {err}")))?;
            match chunk {
                Some(chunk) => bytes.extend_from_slice(&chunk),
                None => break,
            }
        }
        bytes.truncate(self.max_body_bytes);

        Ok(FetchedPage {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
