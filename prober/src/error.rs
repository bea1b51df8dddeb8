use counter_util::drain::DrainError;
use thiserror::Error;

/// Why a single request produced no sample. The loop logs these and moves on.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to build request")]
    Build {
        #[source]
        source: hyper::http::Error,
    },
    #[error("request failed")]
    Transport {
        #[source]
        source: hyper_util::client::legacy::Error,
    },
    #[error("failed to read response body")]
    Body {
        #[source]
        source: DrainError,
    },
    #[error("response is not valid JSON")]
    Json {
        #[source]
        source: serde_json::Error,
    },
    #[error("response has no `data` field")]
    MissingCounter,
    #[error("`data` is not an integer: {value}")]
    NotInteger { value: serde_json::Value },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("No successful samples collected; nothing to analyze.")]
    NoSamples,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    NotPositive { var: &'static str, value: String },
    #[error("{var} is not a valid URL '{value}'")]
    InvalidUrl {
        var: &'static str,
        value: String,
        #[source]
        source: hyper::http::uri::InvalidUri,
    },
    #[error("{var} must be an absolute http or https URL, got '{value}'")]
    UnsupportedUrl { var: &'static str, value: String },
}
