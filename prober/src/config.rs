use std::num::NonZeroU64;
use std::time::Duration;

use hyper::Uri;

use crate::error::ConfigError;

pub const DEFAULT_URL: &str = "https://www.aimadlab.com/api/click-count/add";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(110);

pub const URL_VAR: &str = "PROBER_URL";
pub const CHECK_INTERVAL_VAR: &str = "PROBER_CHECK_INTERVAL_MS";
pub const MAX_REQUESTS_VAR: &str = "PROBER_MAX_REQUESTS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub url: Uri,
    /// How long the loop waits for in-flight requests before issuing the next one.
    pub check_interval: Duration,
    /// `None` runs until shutdown.
    pub max_requests: Option<NonZeroU64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: Uri::from_static(DEFAULT_URL),
            check_interval: DEFAULT_CHECK_INTERVAL,
            max_requests: None,
        }
    }
}

impl ProbeConfig {
    /// Compiled-in defaults, overridden by `PROBER_*` environment variables.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for any override that is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// # Errors
    /// Returns a [`ConfigError`] for any override that is set but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(URL_VAR) {
            config.url = parse_url(URL_VAR, value)?;
        }
        if let Some(value) = lookup(CHECK_INTERVAL_VAR) {
            let millis = parse_positive(CHECK_INTERVAL_VAR, value)?;
            config.check_interval = Duration::from_millis(millis.get());
        }
        if let Some(value) = lookup(MAX_REQUESTS_VAR) {
            config.max_requests = Some(parse_positive(MAX_REQUESTS_VAR, value)?);
        }
        Ok(config)
    }

    /// The request budget as printed in status lines, `inf` when unbounded.
    #[must_use]
    pub fn max_label(&self) -> String {
        max_label(self.max_requests)
    }
}

pub(crate) fn max_label(max_requests: Option<NonZeroU64>) -> String {
    max_requests.map_or_else(|| "inf".to_owned(), |max| max.to_string())
}

fn parse_url(var: &'static str, value: String) -> Result<Uri, ConfigError> {
    let uri: Uri = match value.trim().parse() {
        Ok(uri) => uri,
        Err(source) => return Err(ConfigError::InvalidUrl { var, value, source }),
    };
    let scheme_ok = matches!(uri.scheme_str(), Some("http" | "https"));
    if !scheme_ok || uri.authority().is_none() {
        return Err(ConfigError::UnsupportedUrl { var, value });
    }
    Ok(uri)
}

fn parse_positive(var: &'static str, value: String) -> Result<NonZeroU64, ConfigError> {
    match value.trim().parse::<NonZeroU64>() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::NotPositive { var, value }),
    }
}
