//! robots.txt check command

use crate::config::Config;
use crate::crawl::Fetcher;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Verdict for one URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub url: String,
    pub agent: String,
    pub allowed: bool,
    pub robots_enforced: bool,
    pub crawl_delay: Option<f64>,
}

/// Evaluate the compliance gate for `url` without fetching it
pub async fn cmd_check(config: &Config, url: &str) -> Result<CheckResult> {
    let url = Url::parse(url)?;
    let fetcher = Fetcher::new(&config.fetch)?;
    let gate = fetcher.gate();

    info!("Checking robots.txt for {}", url);

    let (allowed, crawl_delay) = if gate.is_enabled() {
        let rules = gate.rules_for(&url).await;
        (
            rules.is_allowed(url.as_str(), gate.agent()),
            rules.crawl_delay(gate.agent()),
        )
    } else {
        (true, None)
    };

    Ok(CheckResult {
        url: url.to_string(),
        agent: gate.agent().to_string(),
        allowed,
        robots_enforced: gate.is_enabled(),
        crawl_delay,
    })
}

pub fn print_check(result: &CheckResult) {
    let verdict = if result.allowed { "✓ Allowed" } else { "✗ Disallowed" };
    println!("{} for agent '{}': {}", verdict, result.agent, result.url);
    if !result.robots_enforced {
        println!("  robots.txt checks are disabled in config");
    }
    if let Some(delay) = result.crawl_delay {
        println!("  Crawl-delay: {}s", delay);
    }
}
