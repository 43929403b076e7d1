//! HTTP fetching behind the robots.txt gate
//!
//! This module provides:
//! - A shared HTTP client with configurable timeouts
//! - robots.txt parsing and respect
//! - Status and transport failures mapped onto upstream errors

mod robots;

pub use robots::*;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A fetched response body
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedBody {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client paired with the compliance gate
pub struct Fetcher {
    client: Client,
    gate: ComplianceGate,
}

impl Fetcher {
    /// Create a new fetcher
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let gate = ComplianceGate::new(client.clone(), config);
        Ok(Self { client, gate })
    }

    pub fn gate(&self) -> &ComplianceGate {
        &self.gate
    }

    /// GET a URL once the gate allows it
    pub async fn get(&self, url: &Url) -> Result<FetchedBody> {
        if !self.gate.can_fetch(url).await {
            return Err(Error::PolicyDenied(url.to_string()));
        }

        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("HTTP {}: {}", status, url)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("{}: {}", url, e)))?;

        Ok(FetchedBody {
            url: url.clone(),
            content_type,
            body: body.to_vec(),
        })
    }
}
