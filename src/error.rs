// Error taxonomy for calls against the media service. Every remote call
// ends in one of these; the workflow decides which ones are fatal.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`crate::api::ApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS,
    /// timeout, body read interrupted).
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status code.
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The service answered OK but the body did not match the expected shape.
    #[error("unexpected response body from {url}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} is missing `{field}`")]
    MissingField { url: String, field: &'static str },

    /// The local file to upload could not be opened.
    #[error("cannot read {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build a URL for {path}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("not logged in")]
    NotAuthenticated,
}

impl ApiError {
    /// True when the failure happened on this side without reaching the service.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ApiError::File { .. } | ApiError::NotAuthenticated | ApiError::InvalidUrl { .. }
        )
    }
}
