//! Provider errors.
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
use crate::classify::classify;
use crate::document::DocumentError;
use crate::graphql;
use crate::query::filter::FilterError;
use crate::services::ClientError;
use crate::services::TransportError;
use crate::token::OnSessionExpired;

/// The error every public operation fails with: a message and an HTTP-like status code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct HttpError {
    pub message: String,
    pub status_code: u16,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(message, 500)
    }
}

/// Failures raised while serving an operation, before they are normalized.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ProviderError {
    /// {0}
    Classified(HttpError),

    /// {0}
    Transport(ClientError),

    /// the backend reported errors in its payload
    Payload {
        /// The embedded errors.
        errors: Vec<graphql::Error>,
    },

    /// invalid configuration: {0}
    Configuration(#[from] ConfigurationError),

    /// invalid filters: {0}
    Filter(#[from] FilterError),

    /// could not build the document: {0}
    Document(#[from] DocumentError),

    /// response was malformed: {reason}
    MalformedResponse {
        /// What was unexpected.
        reason: String,
    },
}

impl From<TransportError> for ProviderError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Client(error) => ProviderError::Transport(error),
            TransportError::Normalized(error) => ProviderError::Classified(error),
        }
    }
}

impl From<HttpError> for ProviderError {
    fn from(error: HttpError) -> Self {
        ProviderError::Classified(error)
    }
}

impl ProviderError {
    /// Normalize into the error returned to the caller.
    ///
    /// Consumes the error, so the classifier and `on_session_expired` run at most once per
    /// failed call. Already normalized errors are returned untouched.
    pub fn into_http_error(self, on_session_expired: Option<&OnSessionExpired>) -> HttpError {
        match self {
            ProviderError::Classified(error) => error,
            ProviderError::Transport(error) => classify(Some(&error), on_session_expired),
            ProviderError::Payload { errors } => {
                classify(Some(&ClientError::graphql(errors)), on_session_expired)
            }
            ProviderError::Configuration(_) | ProviderError::Filter(_) => {
                HttpError::new(self.to_string(), 400)
            }
            ProviderError::Document(_) | ProviderError::MalformedResponse { .. } => {
                HttpError::internal(self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    #[test]
    fn http_error_serializes_with_camel_case() {
        assert_eq!(
            serde_json::to_value(HttpError::new("nope", 403)).unwrap(),
            json!({"message": "nope", "statusCode": 403})
        );
    }

    #[test]
    fn classified_errors_pass_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: OnSessionExpired = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let original = HttpError::new("Token expired. Please login again.", 418);
        let error = ProviderError::from(TransportError::Normalized(original.clone()));
        assert_eq!(error.into_http_error(Some(&callback)), original);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn payload_errors_are_bad_requests() {
        let error = ProviderError::Payload {
            errors: vec![graphql::Error::new("1 relations exist")],
        };
        assert_eq!(
            error.into_http_error(None),
            HttpError::new("1 relations exist", 400)
        );
    }

    #[test]
    fn configuration_errors_are_bad_requests() {
        let error = ProviderError::from(ConfigurationError::BothQueryAndMutation);
        let normalized = error.into_http_error(None);
        assert_eq!(normalized.status_code, 400);
        assert!(normalized.message.starts_with("invalid configuration: "));
    }

    #[test]
    fn unexpected_errors_are_internal() {
        let error = ProviderError::MalformedResponse {
            reason: "expected an array".to_string(),
        };
        assert_eq!(
            error.into_http_error(None),
            HttpError::new("response was malformed: expected an array", 500)
        );
    }
}
