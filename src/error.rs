//! Error type shared by the client, the controllers and the CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    /// Missing input, caught before any request is sent.
    #[error("{0}")]
    Validation(String),

    /// Non-2xx response. `message` is the provider's own text when the
    /// error body carried one.
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or("no message"))]
    Http {
        status: u16,
        message: Option<String>,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// 2xx response whose body does not hold what we need.
    #[error("{0}")]
    Contract(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StudioError {
    /// The single line shown inline in the window or printed by the CLI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            Self::Http { status, .. } => format!("Error: {status}"),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_prefers_provider_message() {
        let err = StudioError::Http {
            status: 402,
            message: Some("Insufficient credits".into()),
        };
        assert_eq!(err.user_message(), "Insufficient credits");
    }

    #[test]
    fn http_error_without_message_shows_status() {
        let err = StudioError::Http {
            status: 500,
            message: None,
        };
        assert_eq!(err.user_message(), "Error: 500");

        let empty = StudioError::Http {
            status: 401,
            message: Some(String::new()),
        };
        assert_eq!(empty.user_message(), "Error: 401");
    }

    #[test]
    fn contract_error_is_shown_verbatim() {
        let err = StudioError::Contract("No audio URL returned".into());
        assert_eq!(err.user_message(), "No audio URL returned");
    }
}
