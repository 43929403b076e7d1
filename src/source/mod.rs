//! Source adapters
//!
//! Every configured origin is one of two kinds, each behind the same
//! [`Source`] contract:
//! - [`ApiSource`]: GET a JSON endpoint with the query as a parameter
//! - [`DocumentSource`]: GET an HTML page built from a URL pattern

mod api;
mod document;

pub use api::*;
pub use document::*;

use crate::config::{SourceConfig, SourceKind};
use crate::crawl::Fetcher;
use crate::error::Result;
use crate::parse::{ExtractOptions, RawPayload};
use async_trait::async_trait;
use url::Url;

/// Placeholder replaced by the run's query in endpoints and URL patterns
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Payloads from one fetch, with the URL they came from
#[derive(Debug)]
pub struct Fetched {
    pub url: Url,
    pub payloads: Vec<RawPayload>,
}

/// A configured origin that can be fetched
#[async_trait]
pub trait Source: Send + Sync {
    /// Name used as the origin tag
    fn name(&self) -> &str;

    /// Build the URL this source will request
    fn target_url(&self, query: Option<&str>) -> Result<Url>;

    /// How this source's payloads are turned into records
    fn extract_options(&self) -> ExtractOptions;

    /// Fetch and parse the source's payloads
    async fn fetch(&self, fetcher: &Fetcher, query: Option<&str>) -> Result<Fetched>;
}

/// Build the adapter for a configured source
pub fn build_source(config: &SourceConfig) -> Box<dyn Source> {
    match &config.kind {
        SourceKind::Api {
            endpoint,
            query_param,
            mapping,
        } => Box::new(ApiSource::new(
            config.name.clone(),
            endpoint.clone(),
            query_param.clone(),
            mapping.clone(),
        )),
        SourceKind::Document {
            url_pattern,
            capture_metadata,
        } => Box::new(DocumentSource::new(
            config.name.clone(),
            url_pattern.clone(),
            *capture_metadata,
        )),
    }
}

/// Replace the query placeholder with the form-encoded query
pub fn substitute_query(pattern: &str, query: Option<&str>) -> String {
    if !pattern.contains(QUERY_PLACEHOLDER) {
        return pattern.to_string();
    }
    let encoded: String = url::form_urlencoded::byte_serialize(query.unwrap_or_default().as_bytes())
        .collect();
    pattern.replace(QUERY_PLACEHOLDER, &encoded)
}
