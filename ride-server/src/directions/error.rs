//! Directions client error types.

use std::fmt;

/// Errors from a directions provider.
#[derive(Debug)]
pub enum DirectionsError {
    /// HTTP request failed (network error, timeout, etc.)
    Http(reqwest::Error),

    /// Response body could not be decoded
    Json {
        message: String,
        body: Option<String>,
    },

    /// Upstream returned an error status code
    ApiError { status: u16, message: String },

    /// Upstream answered but found no route between the points
    NoRoute,

    /// Rate limited by the upstream
    RateLimited,

    /// No provider is configured
    NotConfigured,
}

impl DirectionsError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DirectionsError::Http(e) => !e.is_builder(),
            DirectionsError::ApiError { status, .. } => *status >= 500,
            DirectionsError::RateLimited => true,
            _ => false,
        }
    }
}

impl fmt::Display for DirectionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionsError::Http(e) => write!(f, "HTTP error: {e}"),
            DirectionsError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
            DirectionsError::ApiError { status, message } => {
                write!(f, "API error {status}: {message}")
            }
            DirectionsError::NoRoute => write!(f, "no route between the given points"),
            DirectionsError::RateLimited => write!(f, "rate limited by directions API"),
            DirectionsError::NotConfigured => write!(f, "directions provider not configured"),
        }
    }
}

impl std::error::Error for DirectionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectionsError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DirectionsError {
    fn from(err: reqwest::Error) -> Self {
        DirectionsError::Http(err)
    }
}
