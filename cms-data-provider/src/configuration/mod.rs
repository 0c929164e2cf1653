//! Logic for loading configuration in to an object model
use std::str::FromStr;
use std::time::Duration;

use derivative::Derivative;
use displaydoc::Display;
use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use indexmap::IndexMap;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::query::filter::CompileMode;
use crate::query::filter::FilterCompiler;
use crate::query::pagination::PaginationDefaults;
use crate::query::FieldMarkers;
use crate::services::http::HttpClientFactory;

/// Configuration error.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// a custom operation takes either a query or a mutation, not both
    BothQueryAndMutation,

    /// a custom operation needs a query or a mutation
    MissingDocument,

    /// invalid header name '{name}': {reason}
    InvalidHeaderName { name: String, reason: String },

    /// invalid value for header '{name}': {reason}
    InvalidHeaderValue { name: String, reason: String },

    /// could not build the http client: {reason}
    HttpClient { reason: String },
}

/// The configuration of a data provider.
///
/// Can be created through `serde::Deserialize` from various formats, or parsed from YAML
/// with [`FromStr`].
#[derive(Clone, Derivative, Deserialize, Serialize, JsonSchema)]
#[derivative(Debug)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// The GraphQL endpoint of the backend.
    pub url: Url,

    /// A static bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[derivative(Debug = "ignore")]
    pub token: Option<String>,

    /// HTTP transport options.
    #[serde(default)]
    pub transport: Transport,

    /// Filter compilation options.
    #[serde(default)]
    pub filters: Filters,

    /// Pagination used when a list call does not supply one.
    #[serde(default)]
    pub pagination: PaginationDefaults,
}

/// HTTP transport options.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Transport {
    /// Request timeout in human-readable format, e.g. `30s`. No timeout when absent.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,

    /// Static headers sent with every request.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
}

impl Transport {
    pub fn header_map(&self) -> Result<HeaderMap, ConfigurationError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                ConfigurationError::InvalidHeaderName {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|err| {
                ConfigurationError::InvalidHeaderValue {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }

    pub fn client_factory(&self) -> Result<HttpClientFactory, ConfigurationError> {
        HttpClientFactory::new(self.timeout, self.header_map()?)
    }
}

/// Filter compilation options.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Filters {
    /// `best_effort` skips malformed conditions, `strict` rejects them.
    pub mode: CompileMode,

    /// Prefix stripped from field paths.
    /// default: "data."
    pub namespace_prefix: String,

    /// Prefix routing a condition into the relation filter.
    /// default: "relation."
    pub relation_prefix: String,

    /// Field routed into the key lookup.
    /// default: "_key"
    pub reserved_key: String,
}

impl Default for Filters {
    fn default() -> Self {
        let markers = FieldMarkers::default();
        Self {
            mode: CompileMode::default(),
            namespace_prefix: markers.namespace_prefix,
            relation_prefix: markers.relation_prefix,
            reserved_key: markers.reserved_key,
        }
    }
}

impl Filters {
    pub fn compiler(&self) -> FilterCompiler {
        FilterCompiler::new(
            FieldMarkers {
                namespace_prefix: self.namespace_prefix.clone(),
                relation_prefix: self.relation_prefix.clone(),
                reserved_key: self.reserved_key.clone(),
            },
            self.mode,
        )
    }
}

impl Configuration {
    /// A configuration for `url` with every option defaulted.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            transport: Transport::default(),
            filters: Filters::default(),
            pagination: PaginationDefaults::default(),
        }
    }

    /// The JSON schema of the configuration file.
    pub fn json_schema() -> RootSchema {
        schemars::schema_for!(Configuration)
    }
}

impl FromStr for Configuration {
    type Err = serde_yaml::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn minimal_configuration() {
        let configuration: Configuration = "url: https://cms.example.com/graphql".parse().unwrap();
        assert_eq!(
            configuration.url.as_str(),
            "https://cms.example.com/graphql"
        );
        assert_eq!(configuration.token, None);
        assert_eq!(configuration.transport.timeout, None);
        assert_eq!(configuration.filters.mode, CompileMode::BestEffort);
        assert_eq!(configuration.filters.reserved_key, "_key");
        assert_eq!(configuration.pagination, PaginationDefaults::default());
    }

    #[test]
    fn full_configuration() {
        let configuration: Configuration = r#"
url: https://cms.example.com/graphql
token: secret
transport:
  timeout: 30s
  headers:
    x-tenant: acme
filters:
  mode: strict
  namespace_prefix: "attributes."
pagination:
  size: 25
"#
        .parse()
        .unwrap();
        assert_eq!(configuration.token.as_deref(), Some("secret"));
        assert_eq!(
            configuration.transport.timeout,
            Some(Duration::from_secs(30))
        );
        let headers = configuration.transport.header_map().unwrap();
        assert_eq!(headers["x-tenant"], "acme");
        assert_eq!(configuration.filters.mode, CompileMode::Strict);
        assert_eq!(
            configuration.filters.compiler().markers().namespace_prefix,
            "attributes."
        );
        assert_eq!(configuration.filters.relation_prefix, "relation.");
        assert_eq!(configuration.pagination.page, 1);
        assert_eq!(configuration.pagination.size, 25);
    }

    #[test]
    fn token_is_not_debug_printed() {
        let configuration: Configuration = "url: https://cms.example.com/graphql\ntoken: secret"
            .parse()
            .unwrap();
        assert!(!format!("{configuration:?}").contains("secret"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!("url: https://cms.example.com/graphql\nretries: 3"
            .parse::<Configuration>()
            .is_err());
        assert!("url: https://cms.example.com/graphql\nfilters:\n  prefix: x"
            .parse::<Configuration>()
            .is_err());
    }

    #[test]
    fn invalid_headers() {
        let mut transport = Transport::default();
        transport
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            transport.header_map(),
            Err(ConfigurationError::InvalidHeaderName { .. })
        ));

        let mut transport = Transport::default();
        transport
            .headers
            .insert("x-ok".to_string(), "line\nbreak".to_string());
        assert!(matches!(
            transport.header_map(),
            Err(ConfigurationError::InvalidHeaderValue { .. })
        ));
    }

    #[test]
    fn schema_lists_the_sections() {
        let schema = serde_json::to_value(Configuration::json_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for section in ["url", "token", "transport", "filters", "pagination"] {
            assert!(properties.contains_key(section), "missing {section}");
        }
        assert_eq!(schema["required"], serde_json::json!(["url"]));
    }

    #[test]
    fn schema_describes_headers_as_a_string_map() {
        let schema = serde_json::to_value(Configuration::json_schema()).unwrap();
        let headers = &schema["definitions"]["Transport"]["properties"]["headers"];
        assert_eq!(headers["type"], "object");
        assert_eq!(
            headers["additionalProperties"],
            serde_json::json!({"type": "string"})
        );
    }
}
