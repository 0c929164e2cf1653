//! Classification of failed calls into [`HttpError`]s.

use crate::error::HttpError;
use crate::services::ClientError;
use crate::token::OnSessionExpired;

const UNKNOWN_ERROR: &str = "Unknown error occurred";
const TOKEN_EXPIRED: &str = "Token expired. Please login again.";
const AUTHENTICATION_FAILED: &str = "Authentication failed. Please login again.";

/// Substrings that mark a GraphQL error message as an authentication failure.
const AUTH_KEYWORDS: [&str; 5] = [
    "unauthorized",
    "forbidden",
    "token",
    "authentication",
    "authorization",
];

/// Classify a failed call.
///
/// Network failures take precedence over GraphQL errors. `on_session_expired` is invoked at
/// most once, when the failure looks like a rejected session.
pub fn classify(
    error: Option<&ClientError>,
    on_session_expired: Option<&OnSessionExpired>,
) -> HttpError {
    let Some(error) = error else {
        return HttpError::new(UNKNOWN_ERROR, 500);
    };

    if let Some(network) = &error.network {
        return match network.status_code {
            Some(401 | 403) => {
                expire_session(on_session_expired);
                HttpError::new(TOKEN_EXPIRED, 403)
            }
            status_code => {
                let detail = if network.message.is_empty() {
                    error.message.as_str()
                } else {
                    network.message.as_str()
                };
                HttpError::new(
                    format!("Network error: {detail}"),
                    status_code.unwrap_or(503),
                )
            }
        };
    }

    if !error.graphql_errors.is_empty() {
        let is_auth_failure = error.graphql_errors.iter().any(|error| {
            let message = error.message.to_lowercase();
            AUTH_KEYWORDS.iter().any(|keyword| message.contains(keyword))
        });
        if is_auth_failure {
            expire_session(on_session_expired);
            return HttpError::new(AUTHENTICATION_FAILED, 403);
        }

        let message = error
            .graphql_errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return HttpError::new(message, 400);
    }

    if error.message.is_empty() {
        HttpError::new(UNKNOWN_ERROR, 400)
    } else {
        HttpError::new(error.message.clone(), 400)
    }
}

fn expire_session(on_session_expired: Option<&OnSessionExpired>) {
    tracing::debug!("session looks expired");
    if let Some(callback) = on_session_expired {
        callback();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graphql;

    fn counting_callback() -> (OnSessionExpired, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: OnSessionExpired = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, calls)
    }

    #[test]
    fn no_error() {
        assert_eq!(classify(None, None), HttpError::new(UNKNOWN_ERROR, 500));
    }

    #[test]
    fn forbidden_network_error_wins_over_graphql_errors() {
        let (callback, calls) = counting_callback();
        let mut error = ClientError::network(Some(403), "Response failed with status code 403");
        error.graphql_errors = vec![graphql::Error::new("Field 'x' is invalid")];

        assert_eq!(
            classify(Some(&error), Some(&callback)),
            HttpError::new(TOKEN_EXPIRED, 403)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unauthorized_network_error_is_reported_as_forbidden() {
        let (callback, calls) = counting_callback();
        let error = ClientError::network(Some(401), "Unauthorized");
        assert_eq!(classify(Some(&error), Some(&callback)).status_code, 403);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_network_errors_keep_their_status() {
        let error = ClientError::network(Some(502), "bad gateway");
        assert_eq!(
            classify(Some(&error), None),
            HttpError::new("Network error: bad gateway", 502)
        );

        let error = ClientError::network(None, "connection refused");
        assert_eq!(
            classify(Some(&error), None),
            HttpError::new("Network error: connection refused", 503)
        );
    }

    #[test]
    fn auth_keywords_are_matched_case_insensitively() {
        let (callback, calls) = counting_callback();
        let error = ClientError::graphql(vec![
            graphql::Error::new("Something else"),
            graphql::Error::new("Invalid TOKEN supplied"),
        ]);
        assert_eq!(
            classify(Some(&error), Some(&callback)),
            HttpError::new(AUTHENTICATION_FAILED, 403)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn graphql_errors_are_joined() {
        let (callback, calls) = counting_callback();
        let error = ClientError::graphql(vec![
            graphql::Error::new("GraphQL Error"),
            graphql::Error::new("Another one"),
        ]);
        assert_eq!(
            classify(Some(&error), Some(&callback)),
            HttpError::new("GraphQL Error, Another one", 400)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_uses_the_message() {
        assert_eq!(
            classify(Some(&ClientError::other("boom")), None),
            HttpError::new("boom", 400)
        );
        assert_eq!(
            classify(Some(&ClientError::default()), None),
            HttpError::new(UNKNOWN_ERROR, 400)
        );
    }
}
