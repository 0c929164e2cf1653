//! A [`Transport`] posting GraphQL requests over HTTP with reqwest.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

use super::ClientError;
use super::ClientFactory;
use super::Transport;
use super::TransportError;
use crate::configuration::ConfigurationError;
use crate::error::HttpError;
use crate::graphql;

/// Posts GraphQL requests as JSON, authenticated with a bearer token.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    url: Url,
    token: Option<String>,
}

impl HttpTransport {
    /// Construct a new transport that will post to the supplied URL.
    pub fn new(http_client: reqwest::Client, url: Url, token: Option<String>) -> Self {
        Self {
            http_client,
            url,
            token,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn execute(
        &self,
        request: graphql::Request,
    ) -> Result<graphql::Response, TransportError> {
        let mut builder = self.http_client.post(self.url.clone()).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|err| {
            ClientError::network(err.status().map(|status| status.as_u16()), err.to_string())
        })?;
        let status = response.status();
        tracing::debug!(url = %self.url, %status, "backend responded");

        let body = response
            .bytes()
            .await
            .map_err(|err| unreadable_body(status, err))?;

        if !status.is_success() {
            // error responses frequently still carry a GraphQL body
            let graphql_errors = serde_json::from_slice::<graphql::Response>(&body)
                .map(|response| response.errors)
                .unwrap_or_default();
            let mut error = ClientError::network(
                Some(status.as_u16()),
                format!("Response failed with status code {}", status.as_u16()),
            );
            error.graphql_errors = graphql_errors;
            return Err(error.into());
        }

        let response: graphql::Response = serde_json::from_slice(&body).map_err(|err| {
            HttpError::internal(format!("response was malformed: {err}"))
        })?;
        if !response.errors.is_empty() {
            return Err(ClientError::graphql(response.errors).into());
        }
        Ok(response)
    }
}

// A success status says nothing about a body that never arrived.
fn unreadable_body(status: StatusCode, reason: impl fmt::Display) -> ClientError {
    ClientError::network(
        (!status.is_success()).then(|| status.as_u16()),
        format!("could not read response: {reason}"),
    )
}

#[async_trait]
impl Transport for HttpTransport {
    async fn query(&self, request: graphql::Request) -> Result<graphql::Response, TransportError> {
        self.execute(request).await
    }

    async fn mutation(
        &self,
        request: graphql::Request,
    ) -> Result<graphql::Response, TransportError> {
        self.execute(request).await
    }
}

/// Builds [`HttpTransport`]s sharing one reqwest client.
#[derive(Clone, Debug, Default)]
pub struct HttpClientFactory {
    http_client: reqwest::Client,
}

impl HttpClientFactory {
    /// A factory whose transports time out after `timeout` and send `headers` on every request.
    pub fn new(timeout: Option<Duration>, headers: HeaderMap) -> Result<Self, ConfigurationError> {
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|err| ConfigurationError::HttpClient {
                reason: err.to_string(),
            })?;
        Ok(Self { http_client })
    }

    /// A factory reusing an existing client.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self, url: &Url, token: Option<String>) -> Arc<dyn Transport> {
        Arc::new(HttpTransport::new(
            self.http_client.clone(),
            url.clone(),
            token,
        ))
    }
}
