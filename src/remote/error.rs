use reqwest::{Method, StatusCode};
use thiserror::Error;

/// Failures talking to the remote user API.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote API answered {method} {url} with status {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
    },

    #[error("remote API request {method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("remote API returned an unreadable body for {method} {url}: {source}")]
    Decode {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RemoteError {
    /// HTTP status reported by the remote, if it got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            Self::Transport { source, .. } | Self::Decode { source, .. } => {
                source.status().map(|s| s.as_u16())
            }
        }
    }
}
