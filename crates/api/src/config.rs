/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the
/// remote credentials, which have no sensible default; missing
/// credentials produce a startup warning rather than an abort, matching
/// the reference deployment behavior.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Record-store API base URL.
    pub store_api_url: String,
    /// Record-store bearer token.
    pub store_api_key: String,
    /// Record-store base id.
    pub store_base_id: String,
    /// Table holding batch records.
    pub store_table: String,
    /// WaveSpeed API base URL.
    pub wavespeed_api_url: String,
    /// WaveSpeed bearer token.
    pub wavespeed_api_key: String,
    /// Public base address WaveSpeed posts webhooks back to.
    pub public_base_url: String,
    /// Minimum spacing between sub-job submissions, in milliseconds.
    pub submit_spacing_ms: u64,
    /// Convergence sweep period, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-batch timeout window, in minutes.
    pub poll_timeout_min: i64,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                          |
    /// |------------------------|----------------------------------|
    /// | `HOST`                 | `0.0.0.0`                        |
    /// | `PORT`                 | `3000`                           |
    /// | `AIRTABLE_API_URL`     | `https://api.airtable.com/v0`    |
    /// | `AIRTABLE_API_KEY`     | (none)                           |
    /// | `AIRTABLE_BASE_ID`     | (none)                           |
    /// | `AIRTABLE_TABLE`       | `Batches`                        |
    /// | `WAVESPEED_API_URL`    | `https://api.wavespeed.ai/api/v3`|
    /// | `WAVESPEED_API_KEY`    | (none)                           |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:3000`          |
    /// | `SUBMIT_SPACING_MS`    | `1100`                           |
    /// | `POLL_INTERVAL_MS`     | `30000`                          |
    /// | `POLL_TIMEOUT_MIN`     | `30`                             |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                             |
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000),
            store_api_url: env_or("AIRTABLE_API_URL", "https://api.airtable.com/v0"),
            store_api_key: env_or("AIRTABLE_API_KEY", ""),
            store_base_id: env_or("AIRTABLE_BASE_ID", ""),
            store_table: env_or("AIRTABLE_TABLE", "Batches"),
            wavespeed_api_url: env_or("WAVESPEED_API_URL", "https://api.wavespeed.ai/api/v3"),
            wavespeed_api_key: env_or("WAVESPEED_API_KEY", ""),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:3000"),
            submit_spacing_ms: env_parse("SUBMIT_SPACING_MS", 1100),
            poll_interval_ms: env_parse("POLL_INTERVAL_MS", 30_000),
            poll_timeout_min: env_parse("POLL_TIMEOUT_MIN", 30),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
        }
    }

    /// Callback address handed to WaveSpeed at submission time.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/webhooks/wavespeed",
            self.public_base_url.trim_end_matches('/')
        )
    }

    /// Log a warning for every missing remote credential. The service
    /// still starts; submission and sweeping will fail against the
    /// remote APIs until the credentials are provided.
    pub fn warn_on_missing_credentials(&self) {
        for (name, value) in [
            ("AIRTABLE_API_KEY", &self.store_api_key),
            ("AIRTABLE_BASE_ID", &self.store_base_id),
            ("WAVESPEED_API_KEY", &self.wavespeed_api_key),
        ] {
            if value.is_empty() {
                tracing::warn!(var = name, "Required credential is not set");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_url_strips_trailing_slash() {
        let mut config = AppConfig::from_env();
        config.public_base_url = "https://example.com/".into();
        assert_eq!(config.webhook_url(), "https://example.com/webhooks/wavespeed");
    }
}
