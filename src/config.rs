//! Runtime settings read from the environment (and `.env`, if present).

use std::env;

pub const DEFAULT_SIC_BASE_URL: &str = "http://www.sicsantacruz.com/sic/sic2014";
pub const DEFAULT_CRUZERO_BASE_URL: &str = "http://cruzero.net/cruzero";
pub const DEFAULT_USER_AGENT: &str = concat!("opendatabo/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct Settings {
    pub sic_base_url: String,
    pub cruzero_base_url: String,
    pub user_agent: String,
    /// CKAN API key; `--key` on the command line takes precedence.
    pub ckan_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sic_base_url: DEFAULT_SIC_BASE_URL.to_string(),
            cruzero_base_url: DEFAULT_CRUZERO_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ckan_api_key: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            sic_base_url: get("SIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.sic_base_url),
            cruzero_base_url: get("CRUZERO_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.cruzero_base_url),
            user_agent: get("ODBO_USER_AGENT").unwrap_or(defaults.user_agent),
            ckan_api_key: get("CKAN_API_KEY"),
        }
    }

    /// Prefer an explicit key, fall back to the environment.
    pub fn api_key(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.ckan_api_key.clone())
    }
}
