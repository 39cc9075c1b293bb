//! Error types for the pinning client

use thiserror::Error;

use crate::types::Provider;

/// Result type alias using `PinError`
pub type Result<T> = std::result::Result<T, PinError>;

/// Errors that can occur while pinning content
#[derive(Error, Debug)]
pub enum PinError {
    /// HTTP transport error (connection failure, timeout, no response)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error while reading a pin source
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure attributed to one provider
    #[error("{provider}: {source}")]
    Provider {
        provider: Provider,
        #[source]
        source: Box<PinError>,
    },

    /// The backend answered with a terminal non-2xx status
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The response body was not valid JSON
    #[error("malformed response: JSON syntax error at line {line}, column {column}")]
    MalformedResponse { line: usize, column: usize },

    /// The response decoded but did not carry what was promised
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Empty hash passed to a pin-by-hash operation
    #[error("invalid hash: hash must not be empty")]
    EmptyHash,

    /// Operation the backend cannot perform
    #[error("{0} not supported")]
    Unsupported(&'static str),

    /// No adapter was constructed for the requested provider
    #[error("provider not configured: {0}")]
    NotConfigured(Provider),

    /// Provider name that does not match any known backend
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl PinError {
    /// Wrap an error with the provider it came from. Already-attributed
    /// errors are left alone so the prefix appears once.
    pub(crate) fn attribute(self, provider: Provider) -> Self {
        match self {
            err @ Self::Provider { .. } => err,
            err => Self::Provider {
                provider,
                source: Box::new(err),
            },
        }
    }

    /// The provider this error is attributed to, if any
    pub fn provider(&self) -> Option<Provider> {
        match self {
            Self::Provider { provider, .. } => Some(*provider),
            _ => None,
        }
    }

    /// Check if this is a capability error, looking through attribution
    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::Unsupported(_) => true,
            Self::Provider { source, .. } => source.is_unsupported(),
            _ => false,
        }
    }

    /// Check if this is an input-validation error, looking through attribution
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::EmptyHash => true,
            Self::Provider { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }
}

/// Convert a JSON decode failure, keeping the syntax position when the body
/// was not valid JSON at all.
pub(crate) fn decode_error(err: serde_json::Error) -> PinError {
    if err.is_syntax() || err.is_eof() {
        PinError::MalformedResponse {
            line: err.line(),
            column: err.column(),
        }
    } else {
        PinError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribution_wraps_once() {
        let err = PinError::EmptyHash
            .attribute(Provider::Pinata)
            .attribute(Provider::Infura);
        assert_eq!(err.provider(), Some(Provider::Pinata));
        assert_eq!(err.to_string(), "Pinata: invalid hash: hash must not be empty");
    }

    #[test]
    fn test_unsupported_visible_through_attribution() {
        let err = PinError::Unsupported("pin-by-hash").attribute(Provider::Web3Storage);
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "Web3Storage: pin-by-hash not supported");
    }

    #[test]
    fn test_decode_error_keeps_position() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{\"a\": }").unwrap_err();
        match decode_error(parse_err) {
            PinError::MalformedResponse { line, column } => {
                assert_eq!(line, 1);
                assert!(column > 0);
            }
            other => panic!("expected malformed response, got {other}"),
        }
    }
}
