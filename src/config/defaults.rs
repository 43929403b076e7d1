//! Default values for configuration

/// Default SQLite database path
pub fn default_db_path() -> String {
    std::env::var("HARVEST_DB_PATH").unwrap_or_else(|_| "harvest.db".to_string())
}

/// Default table receiving scraped records
pub fn default_table_name() -> String {
    "scraped_data".to_string()
}

/// Default SQLite busy timeout in seconds
pub fn default_busy_timeout() -> u64 {
    5
}

/// Default directory for CSV snapshots
pub fn default_output_dir() -> String {
    "data".to_string()
}

/// Default: tag CSV rows with origin and URL
pub fn default_include_origin() -> bool {
    true
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("harvest/{} (Scheduled Scraper)", env!("CARGO_PKG_VERSION"))
}

/// Default request timeout in seconds
pub fn default_fetch_timeout() -> u64 {
    30
}

/// Default robots.txt request timeout in seconds
pub fn default_robots_timeout() -> u64 {
    5
}

/// Default: respect robots.txt
pub fn default_respect_robots() -> bool {
    true
}

/// Default agent evaluated against robots.txt groups
pub fn default_robots_agent() -> String {
    "*".to_string()
}

/// Default: capture title and meta description for document sources
pub fn default_capture_metadata() -> bool {
    true
}

/// Default daily run time (UTC)
pub fn default_daily_at() -> String {
    "00:00".to_string()
}

/// Default log level
pub fn default_log_level() -> String {
    "info".to_string()
}

/// Default config file name, looked up in the working directory
pub fn default_config_file() -> &'static str {
    "harvest.toml"
}
