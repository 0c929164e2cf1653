//! The transport collaborator: executes GraphQL documents against the backend.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::error::HttpError;
use crate::graphql;

/// A transport or network level failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkError {
    /// HTTP status of the failed exchange, when the backend answered at all.
    pub status_code: Option<u16>,
    pub message: String,
}

/// A failed call, as reported by the transport.
///
/// Either part may be present, or both: a non-2xx response can still carry GraphQL errors.
#[derive(Clone, Debug, Default, PartialEq, Error)]
#[error("{message}")]
pub struct ClientError {
    pub network: Option<NetworkError>,
    pub graphql_errors: Vec<graphql::Error>,
    pub message: String,
}

impl ClientError {
    /// A network failure, with the HTTP status when there is one.
    pub fn network(status_code: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            network: Some(NetworkError {
                status_code,
                message: message.clone(),
            }),
            graphql_errors: Vec::new(),
            message,
        }
    }

    /// Protocol level errors from an otherwise well formed response.
    pub fn graphql(errors: Vec<graphql::Error>) -> Self {
        let message = errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            network: None,
            graphql_errors: errors,
            message,
        }
    }

    /// Any other failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A failure to be classified.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A failure the transport already normalized, passed through as is.
    #[error(transparent)]
    Normalized(#[from] HttpError),
}

/// Executes GraphQL documents against the backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a read.
    async fn query(&self, request: graphql::Request) -> Result<graphql::Response, TransportError>;

    /// Execute a write.
    async fn mutation(
        &self,
        request: graphql::Request,
    ) -> Result<graphql::Response, TransportError>;
}

/// Builds [`Transport`]s for an endpoint and a bearer token.
#[cfg_attr(test, mockall::automock)]
pub trait ClientFactory: Send + Sync {
    fn create(&self, url: &Url, token: Option<String>) -> Arc<dyn Transport>;
}
