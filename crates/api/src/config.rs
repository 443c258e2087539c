//! Application configuration loaded from environment variables.

use domain::WorkflowSettings;
use integration::DEFAULT_MAX_RETRIES;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is used when unset
/// - `BA_MAX_CONFLICT_RETRIES`: reloads on a version conflict (default: `3`)
/// - `BA_OVERDUE_AFTER_DAYS`: days in flight before a document counts as overdue (default: `7`)
/// - `BA_INTEGRATION_MAX_RETRIES`: failed deliveries before an integration is marked failed (default: `3`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub max_conflict_retries: u32,
    pub overdue_after_days: i64,
    pub integration_max_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_conflict_retries: parsed(&lookup, "BA_MAX_CONFLICT_RETRIES")
                .unwrap_or(defaults.max_conflict_retries),
            overdue_after_days: parsed(&lookup, "BA_OVERDUE_AFTER_DAYS")
                .unwrap_or(defaults.overdue_after_days),
            integration_max_retries: parsed(&lookup, "BA_INTEGRATION_MAX_RETRIES")
                .unwrap_or(defaults.integration_max_retries),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            max_conflict_retries: self.max_conflict_retries,
            overdue_after_days: self.overdue_after_days,
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let workflow = WorkflowSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            max_conflict_retries: workflow.max_conflict_retries,
            overdue_after_days: workflow.overdue_after_days,
            integration_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}
