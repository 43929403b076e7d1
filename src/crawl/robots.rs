//! robots.txt parsing and the fetch-permission gate

use crate::config::FetchConfig;
use reqwest::{Client, StatusCode};
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Parsed robots.txt rules
#[derive(Debug, Clone)]
pub struct RobotsRules {
    content: String,
}

impl RobotsRules {
    /// Parse robots.txt content
    pub fn parse(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Create rules that allow everything
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
        }
    }

    /// Create rules that refuse everything
    pub fn deny_all() -> Self {
        Self {
            content: "User-agent: *\nDisallow: /\n".to_string(),
        }
    }

    /// Check if a URL is allowed for a user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        let allowed = matcher.one_agent_allowed_by_robots(&self.content, user_agent, url);

        if !allowed {
            debug!("robots.txt disallows {} for {}", url, user_agent);
        }

        allowed
    }

    /// Get crawl delay if specified
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        // Prefer a specific user-agent match over the wildcard group
        let ua_lower = user_agent.to_lowercase();
        let mut current_agent: Option<String> = None;
        let mut default_delay: Option<f64> = None;
        let mut specific_delay: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.trim();

            if let Some(agent) = strip_directive(line, "user-agent") {
                current_agent = Some(agent.to_lowercase());
            }

            if let Some(delay_str) = strip_directive(line, "crawl-delay") {
                if let (Some(agent), Ok(delay)) = (&current_agent, delay_str.parse::<f64>()) {
                    if agent == "*" {
                        default_delay = Some(delay);
                    } else if ua_lower.contains(agent.as_str()) {
                        specific_delay = Some(delay);
                    }
                }
            }
        }

        specific_delay.or(default_delay)
    }
}

fn strip_directive<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(name) {
        Some(value.trim())
    } else {
        None
    }
}

/// Decides whether a URL may be fetched per its origin's robots.txt
pub struct ComplianceGate {
    client: Client,
    enabled: bool,
    agent: String,
    timeout: Duration,
    fail_open: bool,
    cache_ttl: Option<Duration>,
    cache: RwLock<HashMap<String, (Instant, RobotsRules)>>,
}

impl ComplianceGate {
    pub fn new(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            enabled: config.respect_robots_txt,
            agent: config.robots_agent.clone(),
            timeout: Duration::from_secs(config.robots_timeout_secs),
            fail_open: config.robots_fail_open,
            cache_ttl: (config.robots_cache_ttl_secs > 0)
                .then(|| Duration::from_secs(config.robots_cache_ttl_secs)),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `url` may be fetched
    pub async fn can_fetch(&self, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }
        self.rules_for(url).await.is_allowed(url.as_str(), &self.agent)
    }

    /// Rules governing `url`'s origin, from cache or the network
    pub async fn rules_for(&self, url: &Url) -> RobotsRules {
        let origin = url.origin().ascii_serialization();

        if let Some(ttl) = self.cache_ttl {
            let cache = self.cache.read().await;
            if let Some((fetched, rules)) = cache.get(&origin) {
                if fetched.elapsed() < ttl {
                    return rules.clone();
                }
            }
        }

        let rules = self.fetch_rules(&origin).await;

        if self.cache_ttl.is_some() {
            let mut cache = self.cache.write().await;
            cache.insert(origin, (Instant::now(), rules.clone()));
        }

        rules
    }

    async fn fetch_rules(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{}/robots.txt", origin);
        debug!("Fetching robots.txt from {}", robots_url);

        let response = self
            .client
            .get(&robots_url)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(text) => RobotsRules::parse(&text),
                Err(e) => self.unreachable(&robots_url, &e.to_string()),
            },
            Ok(resp) => match resp.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    debug!("robots.txt at {} is access-controlled; denying", robots_url);
                    RobotsRules::deny_all()
                }
                status if status.is_client_error() => RobotsRules::allow_all(),
                status => self.unreachable(&robots_url, &format!("HTTP {}", status)),
            },
            Err(e) => self.unreachable(&robots_url, &e.to_string()),
        }
    }

    fn unreachable(&self, robots_url: &str, reason: &str) -> RobotsRules {
        if self.fail_open {
            warn!("robots.txt unavailable at {} ({}); allowing", robots_url, reason);
            RobotsRules::allow_all()
        } else {
            warn!("robots.txt unavailable at {} ({}); denying", robots_url, reason);
            RobotsRules::deny_all()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_RULES: &str = "User-agent: *\nDisallow: /private/\n";

    fn gate(config: FetchConfig) -> ComplianceGate {
        ComplianceGate::new(Client::new(), &config)
    }

    async fn serve_robots(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[test]
    fn test_robots_allow_all() {
        let rules = RobotsRules::allow_all();
        assert!(rules.is_allowed("/any/path", "MyBot"));
        assert!(!RobotsRules::deny_all().is_allowed("/any/path", "*"));
    }

    #[test]
    fn test_robots_basic() {
        let content = r#"
User-agent: *
Disallow: /admin/
Disallow: /private/

User-agent: BadBot
Disallow: /
"#;
        let rules = RobotsRules::parse(content);

        assert!(rules.is_allowed("http://example.com/public/page", "*"));
        assert!(!rules.is_allowed("http://example.com/private/data", "*"));
        assert!(!rules.is_allowed("http://example.com/admin/secret", "GoodBot"));
        assert!(!rules.is_allowed("http://example.com/anything", "BadBot"));
    }

    #[test]
    fn test_crawl_delay() {
        let content = r#"
User-agent: *
Crawl-delay: 2.5

User-agent: SpecialBot
Crawl-delay: 1.0
"#;
        let rules = RobotsRules::parse(content);

        assert_eq!(rules.crawl_delay("SpecialBot"), Some(1.0));
        assert_eq!(rules.crawl_delay("RandomBot"), Some(2.5));
    }

    #[tokio::test]
    async fn test_gate_private_path() {
        let server = MockServer::start().await;
        serve_robots(&server, ResponseTemplate::new(200).set_body_string(PRIVATE_RULES)).await;

        let gate = gate(FetchConfig::default());
        let private = Url::parse(&format!("{}/private/report.html", server.uri())).unwrap();
        let nested = Url::parse(&format!("{}/private/a/b", server.uri())).unwrap();
        let public = Url::parse(&format!("{}/news/today", server.uri())).unwrap();

        assert!(!gate.can_fetch(&private).await);
        assert!(!gate.can_fetch(&nested).await);
        assert!(gate.can_fetch(&public).await);
    }

    #[tokio::test]
    async fn test_gate_missing_robots_allows() {
        let server = MockServer::start().await;
        serve_robots(&server, ResponseTemplate::new(404)).await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(gate(FetchConfig::default()).can_fetch(&url).await);
    }

    #[tokio::test]
    async fn test_gate_forbidden_robots_denies() {
        let server = MockServer::start().await;
        serve_robots(&server, ResponseTemplate::new(403)).await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(!gate(FetchConfig::default()).can_fetch(&url).await);
    }

    #[tokio::test]
    async fn test_gate_server_error_fails_closed() {
        let server = MockServer::start().await;
        serve_robots(&server, ResponseTemplate::new(503)).await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(!gate(FetchConfig::default()).can_fetch(&url).await);

        let open = FetchConfig {
            robots_fail_open: true,
            ..FetchConfig::default()
        };
        assert!(gate(open).can_fetch(&url).await);
    }

    #[tokio::test]
    async fn test_gate_timeout_fails_closed() {
        let server = MockServer::start().await;
        serve_robots(
            &server,
            ResponseTemplate::new(200)
                .set_body_string("")
                .set_delay(Duration::from_secs(3)),
        )
        .await;

        let config = FetchConfig {
            robots_timeout_secs: 1,
            ..FetchConfig::default()
        };
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(!gate(config).can_fetch(&url).await);
    }

    #[tokio::test]
    async fn test_gate_disabled_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
            .expect(0)
            .mount(&server)
            .await;

        let config = FetchConfig {
            respect_robots_txt: false,
            ..FetchConfig::default()
        };
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(gate(config).can_fetch(&url).await);
    }

    #[tokio::test]
    async fn test_gate_cache_reuses_rules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PRIVATE_RULES))
            .expect(1)
            .mount(&server)
            .await;

        let config = FetchConfig {
            robots_cache_ttl_secs: 300,
            ..FetchConfig::default()
        };
        let gate = gate(config);
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(gate.can_fetch(&url).await);
        assert!(gate.can_fetch(&url).await);
    }
}
