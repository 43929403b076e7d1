//! JSON API source

use super::{substitute_query, Fetched, Source};
use crate::config::FieldMapping;
use crate::crawl::Fetcher;
use crate::error::{Error, Result};
use crate::parse::{ExtractOptions, RawPayload};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Source backed by a JSON endpoint
#[derive(Debug, Clone)]
pub struct ApiSource {
    name: String,
    endpoint: String,
    query_param: Option<String>,
    mapping: Option<FieldMapping>,
}

impl ApiSource {
    pub fn new(
        name: String,
        endpoint: String,
        query_param: Option<String>,
        mapping: Option<FieldMapping>,
    ) -> Self {
        Self {
            name,
            endpoint,
            query_param,
            mapping,
        }
    }
}

#[async_trait]
impl Source for ApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_url(&self, query: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&substitute_query(&self.endpoint, query))?;
        if let (Some(param), Some(query)) = (&self.query_param, query) {
            url.query_pairs_mut().append_pair(param, query);
        }
        Ok(url)
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            capture_metadata: false,
            mapping: self.mapping.clone(),
        }
    }

    async fn fetch(&self, fetcher: &Fetcher, query: Option<&str>) -> Result<Fetched> {
        let url = self.target_url(query)?;
        let body = fetcher.get(&url).await?;

        let value: Value = serde_json::from_slice(&body.body).map_err(|e| {
            Error::MalformedResponse(format!("{} did not return JSON: {}", url, e))
        })?;
        debug!(source = %self.name, "Parsed JSON payload from {}", url);

        Ok(Fetched {
            url,
            payloads: vec![RawPayload::Json(value)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    fn source(server: &MockServer) -> ApiSource {
        ApiSource::new(
            "catalog".to_string(),
            format!("{}/api/search", server.uri()),
            Some("q".to_string()),
            None,
        )
    }

    #[tokio::test]
    async fn test_fetch_json() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["a", "b"])))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let fetched = source(&server).fetch(&fetcher, Some("rust")).await.unwrap();

        assert_eq!(fetched.payloads.len(), 1);
        match &fetched.payloads[0] {
            RawPayload::Json(value) => assert_eq!(value, &serde_json::json!(["a", "b"])),
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(fetched.url.as_str().ends_with("/api/search?q=rust"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let err = source(&server).fetch(&fetcher, None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = server().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let err = source(&server).fetch(&fetcher, None).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
