// Runtime configuration for the front-end server
// Loaded with the 'config' crate, layered over an optional .env file

use anyhow::{Result, bail};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Where the search page evaluates its filter criteria.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterPlacement {
    /// Criteria are sent to the remote API as the request body.
    #[default]
    Remote,
    /// The full unfiltered set is fetched and filtered in-process.
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub server_address: String,
    pub page_size: usize,
    pub request_timeout_secs: u64,
    pub accept_invalid_certs: bool,
    pub proxy_url: Option<String>,
    pub filter_placement: FilterPlacement,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            // Add default values
            .set_default("api_base_url", "https://localhost:5000")?
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("page_size", 10)?
            .set_default("request_timeout_secs", 15)?
            .set_default("accept_invalid_certs", false)?
            .set_default("filter_placement", "remote")?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., PADFINDER__API_BASE_URL)
            .add_source(Environment::with_prefix("PADFINDER").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.api_base_url.trim().is_empty() {
            bail!("api_base_url must not be empty");
        }
        Ok(())
    }

    /// Base URL without a trailing slash, ready for `format!("{}/api/..")`.
    pub fn api_origin(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
impl Settings {
    pub fn for_tests(api_base_url: &str) -> Self {
        Settings {
            api_base_url: api_base_url.to_string(),
            server_address: "127.0.0.1:0".to_string(),
            page_size: 10,
            request_timeout_secs: 5,
            accept_invalid_certs: false,
            proxy_url: None,
            filter_placement: FilterPlacement::Remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_page_size_is_rejected() {
        let mut settings = Settings::for_tests("http://localhost:5000");
        settings.page_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn api_origin_strips_trailing_slash() {
        let settings = Settings::for_tests("http://localhost:5000/");
        assert_eq!(settings.api_origin(), "http://localhost:5000");
    }

    #[test]
    fn filter_placement_parses_lowercase() {
        let placement: FilterPlacement = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(placement, FilterPlacement::Local);
    }
}
