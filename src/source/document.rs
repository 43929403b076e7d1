//! HTML document source

use super::{substitute_query, Fetched, Source};
use crate::crawl::Fetcher;
use crate::error::{Error, Result};
use crate::parse::{ExtractOptions, RawPayload};
use async_trait::async_trait;
use scraper::Html;
use tracing::debug;
use url::Url;

/// Source backed by an HTML page
#[derive(Debug, Clone)]
pub struct DocumentSource {
    name: String,
    url_pattern: String,
    capture_metadata: bool,
}

impl DocumentSource {
    pub fn new(name: String, url_pattern: String, capture_metadata: bool) -> Self {
        Self {
            name,
            url_pattern,
            capture_metadata,
        }
    }
}

#[async_trait]
impl Source for DocumentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_url(&self, query: Option<&str>) -> Result<Url> {
        Ok(Url::parse(&substitute_query(&self.url_pattern, query))?)
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            capture_metadata: self.capture_metadata,
            mapping: None,
        }
    }

    async fn fetch(&self, fetcher: &Fetcher, query: Option<&str>) -> Result<Fetched> {
        let url = self.target_url(query)?;
        let body = fetcher.get(&url).await?;

        if body.is_empty() {
            return Err(Error::EmptyResponse(url.to_string()));
        }

        debug!(source = %self.name, bytes = body.body.len(), "Parsing HTML from {}", url);
        let document = Html::parse_document(&body.text());

        Ok(Fetched {
            url,
            payloads: vec![RawPayload::Document(document)],
        })
    }
}
