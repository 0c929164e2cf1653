//! The data provider: generic CRUD calls in, GraphQL documents out.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;
use url::Url;

use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::document::synthesize::Envelope;
use crate::document::synthesize::Extraction;
use crate::document::synthesize::SynthesizedOperation;
use crate::document::synthesize::Synthesizer;
use crate::document::OperationType;
use crate::error::HttpError;
use crate::error::ProviderError;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::meta::MetaQuery;
use crate::naming::EnglishInflector;
use crate::naming::Inflect;
use crate::naming::ResourceNames;
use crate::normalize;
use crate::query::filter::CrudFilter;
use crate::query::filter::FilterCompiler;
use crate::query::pagination::Pagination;
use crate::query::pagination::PaginationDefaults;
use crate::query::sort::compile_sorters;
use crate::query::sort::Sorter;
use crate::services::http::HttpClientFactory;
use crate::services::ClientFactory;
use crate::services::Transport;
use crate::token::OnSessionExpired;
use crate::token::StaticToken;
use crate::token::TokenProvider;

/// Parameters of [`DataProvider::get_list`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetListParams {
    /// Page to fetch, the provider's defaults when absent.
    pub pagination: Option<Pagination>,
    /// Conditions compiled into `where`, `key` and `relation`.
    pub filters: Vec<CrudFilter>,
    /// Sort order, later sorters on the same field win.
    pub sorters: Vec<Sorter>,
    /// Per-call options.
    pub meta: MetaQuery,
}

/// A page of records and the total the backend reported for the whole list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub data: Vec<Value>,
    pub total: u64,
}

/// The result of every operation but [`DataProvider::get_list`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T = Value> {
    pub data: T,
}

impl<T> OperationResult<T> {
    fn new(data: T) -> Self {
        Self { data }
    }
}

/// Serves list, get, create, create-many, update, delete and custom calls against a
/// GraphQL backend.
///
/// Calls are independent: each one builds its own document and variables, asks the token
/// provider for the current token and gets a fresh transport from the client factory.
/// Failures are always reported as an [`HttpError`].
#[derive(Clone)]
pub struct DataProvider {
    url: Url,
    token_provider: Arc<dyn TokenProvider>,
    client_factory: Arc<dyn ClientFactory>,
    on_session_expired: Option<OnSessionExpired>,
    filter_compiler: FilterCompiler,
    pagination: PaginationDefaults,
    inflector: Arc<dyn Inflect>,
}

impl fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataProvider")
            .field("url", &self.url.as_str())
            .field("filter_compiler", &self.filter_compiler)
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

impl DataProvider {
    /// An anonymous provider for `url` posting over HTTP.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token_provider: Arc::new(StaticToken::anonymous()),
            client_factory: Arc::new(HttpClientFactory::default()),
            on_session_expired: None,
            filter_compiler: FilterCompiler::default(),
            pagination: PaginationDefaults::default(),
            inflector: Arc::new(EnglishInflector),
        }
    }

    /// A provider set up from a configuration file.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, ConfigurationError> {
        let mut provider = Self::new(configuration.url.clone())
            .with_client_factory(configuration.transport.client_factory()?)
            .with_filter_compiler(configuration.filters.compiler())
            .with_pagination_defaults(configuration.pagination);
        if let Some(token) = &configuration.token {
            provider = provider.with_token_provider(StaticToken::new(token.as_str()));
        }
        Ok(provider)
    }

    /// Ask `token_provider` for the bearer token of every call.
    pub fn with_token_provider(mut self, token_provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Arc::new(token_provider);
        self
    }

    /// Build transports with `client_factory` instead of the default HTTP one.
    pub fn with_client_factory(mut self, client_factory: impl ClientFactory + 'static) -> Self {
        self.client_factory = Arc::new(client_factory);
        self
    }

    /// Invoke `callback` when a call fails in a way that looks like a rejected session.
    pub fn with_session_expired(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(callback));
        self
    }

    /// Compile list filters with `filter_compiler`.
    pub fn with_filter_compiler(mut self, filter_compiler: FilterCompiler) -> Self {
        self.filter_compiler = filter_compiler;
        self
    }

    /// Page used when a list call supplies none.
    pub fn with_pagination_defaults(mut self, pagination: PaginationDefaults) -> Self {
        self.pagination = pagination;
        self
    }

    /// Derive type and field names with `inflector`.
    pub fn with_inflector(mut self, inflector: Arc<dyn Inflect>) -> Self {
        self.inflector = inflector;
        self
    }

    /// The backend endpoint.
    pub fn api_url(&self) -> &Url {
        &self.url
    }

    /// The current bearer token.
    pub fn token(&self) -> Option<String> {
        self.token_provider.token()
    }

    /// A transport authenticated with the current token.
    pub fn api_client(&self) -> Arc<dyn Transport> {
        self.client_factory.create(&self.url, self.token())
    }

    /// A page of `resource` records matching `params.filters`.
    #[instrument(skip_all, fields(resource = %resource, operation = "get_list"))]
    pub async fn get_list(
        &self,
        resource: &str,
        params: GetListParams,
    ) -> Result<ListResult, HttpError> {
        self.try_get_list(resource, params)
            .await
            .map_err(|error| self.fail(error))
    }

    /// The `resource` record identified by `id`.
    #[instrument(skip_all, fields(resource = %resource, operation = "get_one"))]
    pub async fn get_one(
        &self,
        resource: &str,
        id: &str,
        meta: MetaQuery,
    ) -> Result<OperationResult, HttpError> {
        self.try_get_one(resource, id, meta)
            .await
            .map_err(|error| self.fail(error))
    }

    /// Create a `resource` record from `variables`.
    ///
    /// A `connect` entry of `variables` is sent as the relations to connect.
    #[instrument(skip_all, fields(resource = %resource, operation = "create"))]
    pub async fn create(
        &self,
        resource: &str,
        variables: Value,
        meta: MetaQuery,
    ) -> Result<OperationResult, HttpError> {
        self.try_create(resource, variables, meta)
            .await
            .map_err(|error| self.fail(error))
    }

    /// Create or update several `resource` records at once. Empty entries are dropped.
    #[instrument(skip_all, fields(resource = %resource, operation = "create_many"))]
    pub async fn create_many(
        &self,
        resource: &str,
        variables: Vec<Value>,
        meta: MetaQuery,
    ) -> Result<OperationResult<Vec<Value>>, HttpError> {
        self.try_create_many(resource, variables, meta)
            .await
            .map_err(|error| self.fail(error))
    }

    /// Update the `resource` record identified by `id`.
    ///
    /// `connect` and `disconnect` entries of `variables` are sent as relation changes.
    #[instrument(skip_all, fields(resource = %resource, operation = "update"))]
    pub async fn update(
        &self,
        resource: &str,
        id: &str,
        variables: Value,
        meta: MetaQuery,
    ) -> Result<OperationResult, HttpError> {
        self.try_update(resource, id, variables, meta)
            .await
            .map_err(|error| self.fail(error))
    }

    /// Delete the `resource` record identified by `id`. Resolves to `{id, result}`.
    #[instrument(skip_all, fields(resource = %resource, operation = "delete_one"))]
    pub async fn delete_one(&self, resource: &str, id: &str) -> Result<OperationResult, HttpError> {
        self.try_delete_one(resource, id)
            .await
            .map_err(|error| self.fail(error))
    }

    /// Run the caller's own query or mutation.
    ///
    /// `filters` are compiled into a `where` variable. A `payloads` variable keyed by
    /// indices is sent as a list.
    #[instrument(skip_all, fields(operation = "custom"))]
    pub async fn custom(
        &self,
        filters: Vec<CrudFilter>,
        meta: MetaQuery,
    ) -> Result<OperationResult, HttpError> {
        self.try_custom(filters, meta)
            .await
            .map_err(|error| self.fail(error))
    }

    async fn try_get_list(
        &self,
        resource: &str,
        params: GetListParams,
    ) -> Result<ListResult, ProviderError> {
        let GetListParams {
            pagination,
            filters,
            sorters,
            meta,
        } = params;

        if let Some((document, variables)) = meta.raw_document() {
            let key = meta.query_key.as_deref().unwrap_or(resource);
            let extraction = Extraction::list(key, format!("{key}Count"));
            let data = self
                .execute_raw(&meta, document, variables, &extraction.key)
                .await?;
            let (records, total) =
                normalize::extract_list(&data, &extraction.key, extraction.count_key.as_deref())?;
            let total = total.unwrap_or(records.len() as u64);
            return Ok(ListResult {
                data: records,
                total,
            });
        }

        let mut compiled = self.filter_compiler.compile(&filters)?;
        if let Some(seed) = meta.reverse_lookup.clone() {
            compiled.seed_relation(seed);
        }
        let (page, size) = pagination.unwrap_or_default().resolve(&self.pagination);

        let mut variables = Object::new();
        variables.insert("where".to_string(), Value::Object(compiled.where_clause));
        variables.insert(
            "sort".to_string(),
            Value::Object(compile_sorters(&sorters, self.filter_compiler.markers())),
        );
        variables.insert("page".to_string(), page.into());
        variables.insert("size".to_string(), size.into());
        let has_key = compiled.key_condition.is_some();
        if let Some(key) = compiled.key_condition {
            variables.insert("key".to_string(), Value::Object(key));
        }
        let has_relation = compiled.relation_condition.is_some();
        if let Some(relation) = compiled.relation_condition {
            variables.insert("relation".to_string(), Value::Object(relation));
        }

        let operation =
            self.synthesizer(resource)
                .list(&meta.projection(), has_key, has_relation)?;
        let data = self.execute(&operation, variables).await?;
        let extraction = &operation.extraction;
        let (records, total) =
            normalize::extract_list(&data, &extraction.key, extraction.count_key.as_deref())?;
        Ok(ListResult {
            data: records,
            total: total.unwrap_or_default(),
        })
    }

    async fn try_get_one(
        &self,
        resource: &str,
        id: &str,
        meta: MetaQuery,
    ) -> Result<OperationResult, ProviderError> {
        if let Some(result) = self.raw_one(resource, &meta).await? {
            return Ok(result);
        }

        let operation = self.synthesizer(resource).get_one(&meta.projection())?;
        let mut variables = Object::new();
        variables.insert("id".to_string(), Value::String(id.to_string()));
        self.execute_one(&operation, variables).await
    }

    async fn try_create(
        &self,
        resource: &str,
        variables: Value,
        meta: MetaQuery,
    ) -> Result<OperationResult, ProviderError> {
        if let Some(result) = self.raw_one(resource, &meta).await? {
            return Ok(result);
        }

        let relations = RelationChanges::split(variables);
        let operation = self
            .synthesizer(resource)
            .create(&meta.projection(), relations.connect.is_some())?;
        let mut variables = Object::new();
        variables.insert("payload".to_string(), relations.payload);
        if let Some(connect) = relations.connect {
            variables.insert("connect".to_string(), connect);
        }
        self.execute_one(&operation, variables).await
    }

    async fn try_create_many(
        &self,
        resource: &str,
        variables: Vec<Value>,
        meta: MetaQuery,
    ) -> Result<OperationResult<Vec<Value>>, ProviderError> {
        if let Some(OperationResult { data }) = self.raw_one(resource, &meta).await? {
            return Ok(OperationResult::new(records(data)));
        }

        let payloads = variables
            .into_iter()
            .filter(|payload| !payload.is_empty_value())
            .collect();
        let operation = self.synthesizer(resource).create_many(&meta.projection())?;
        let mut variables = Object::new();
        variables.insert("payloads".to_string(), Value::Array(payloads));
        let OperationResult { data } = self.execute_one(&operation, variables).await?;
        Ok(OperationResult::new(records(data)))
    }

    async fn try_update(
        &self,
        resource: &str,
        id: &str,
        variables: Value,
        meta: MetaQuery,
    ) -> Result<OperationResult, ProviderError> {
        if let Some(result) = self.raw_one(resource, &meta).await? {
            return Ok(result);
        }

        let relations = RelationChanges::split(variables);
        let operation = self.synthesizer(resource).update(
            &meta.projection(),
            relations.connect.is_some(),
            relations.disconnect.is_some(),
        )?;
        let mut variables = Object::new();
        variables.insert("id".to_string(), Value::String(id.to_string()));
        variables.insert("payload".to_string(), relations.payload);
        if let Some(connect) = relations.connect {
            variables.insert("connect".to_string(), connect);
        }
        if let Some(disconnect) = relations.disconnect {
            variables.insert("disconnect".to_string(), disconnect);
        }
        variables.insert(
            "deltaUpdate".to_string(),
            Value::Bool(meta.delta_update.unwrap_or_default()),
        );
        self.execute_one(&operation, variables).await
    }

    async fn try_delete_one(
        &self,
        resource: &str,
        id: &str,
    ) -> Result<OperationResult, ProviderError> {
        let operation = self.synthesizer(resource).delete()?;
        let mut variables = Object::new();
        variables.insert(
            "ids".to_string(),
            Value::Array(vec![Value::String(id.to_string())]),
        );
        let OperationResult { data } = self.execute_one(&operation, variables).await?;

        let mut deleted = Object::new();
        deleted.insert("id".to_string(), Value::String(id.to_string()));
        deleted.insert(
            "result".to_string(),
            data.get("result").cloned().unwrap_or(Value::Null),
        );
        Ok(OperationResult::new(Value::Object(deleted)))
    }

    async fn try_custom(
        &self,
        filters: Vec<CrudFilter>,
        meta: MetaQuery,
    ) -> Result<OperationResult, ProviderError> {
        let (document, operation_type) = match (&meta.gql_query, &meta.gql_mutation) {
            (Some(_), Some(_)) => return Err(ConfigurationError::BothQueryAndMutation.into()),
            (None, None) => return Err(ConfigurationError::MissingDocument.into()),
            (Some(query), None) => (query.as_str(), OperationType::Query),
            (None, Some(mutation)) => (mutation.as_str(), OperationType::Mutation),
        };

        let mut variables = meta.variables.clone().unwrap_or_default();
        if !filters.is_empty() {
            let compiled = self.filter_compiler.compile(&filters)?;
            variables.insert("where".to_string(), Value::Object(compiled.where_clause));
        }
        if let Some(payloads) = variables.remove("payloads") {
            variables.insert("payloads".to_string(), payloads.keyed_object_into_array());
        }

        let request = graphql::Request::builder()
            .query(document)
            .variables(variables)
            .build();
        let response = self.send(operation_type, request).await?;
        let data = normalize::into_data(response, meta.query_key.as_deref())?;
        let data = match meta.query_key.as_deref() {
            Some(key) => normalize::extract_one(&data, key, Envelope::Direct),
            None => data,
        };
        Ok(OperationResult::new(data))
    }

    /// Run the caller's raw document, if there is one, reading the result from `queryKey`
    /// or the resource name.
    async fn raw_one(
        &self,
        resource: &str,
        meta: &MetaQuery,
    ) -> Result<Option<OperationResult>, ProviderError> {
        let Some((document, variables)) = meta.raw_document() else {
            return Ok(None);
        };
        let key = meta.query_key.as_deref().unwrap_or(resource);
        let data = self.execute_raw(meta, document, variables, key).await?;
        Ok(Some(OperationResult::new(normalize::extract_one(
            &data,
            key,
            Envelope::Direct,
        ))))
    }

    async fn execute_raw(
        &self,
        meta: &MetaQuery,
        document: &str,
        variables: Object,
        key: &str,
    ) -> Result<Value, ProviderError> {
        let operation_type = if meta.is_raw_mutation() {
            OperationType::Mutation
        } else {
            OperationType::Query
        };
        tracing::debug!(%operation_type, "sending caller supplied document");
        let request = graphql::Request::builder()
            .query(document)
            .variables(variables)
            .build();
        let response = self.send(operation_type, request).await?;
        normalize::into_data(response, Some(key))
    }

    async fn execute(
        &self,
        operation: &SynthesizedOperation,
        variables: Object,
    ) -> Result<Value, ProviderError> {
        let document = operation.document.to_string();
        tracing::debug!(%document, "synthesized document");
        let request = graphql::Request::builder()
            .query(document)
            .operation_name(operation.document.name.clone())
            .variables(variables)
            .build();
        let response = self.send(operation.operation_type(), request).await?;
        normalize::into_data(response, Some(&operation.extraction.key))
    }

    async fn execute_one(
        &self,
        operation: &SynthesizedOperation,
        variables: Object,
    ) -> Result<OperationResult, ProviderError> {
        let data = self.execute(operation, variables).await?;
        let extraction = &operation.extraction;
        Ok(OperationResult::new(normalize::extract_one(
            &data,
            &extraction.key,
            extraction.envelope,
        )))
    }

    async fn send(
        &self,
        operation_type: OperationType,
        request: graphql::Request,
    ) -> Result<graphql::Response, ProviderError> {
        let client = self.api_client();
        let response = match operation_type {
            OperationType::Query => client.query(request).await?,
            OperationType::Mutation => client.mutation(request).await?,
        };
        Ok(response)
    }

    fn synthesizer(&self, resource: &str) -> Synthesizer {
        Synthesizer::new(ResourceNames::with_inflector(
            resource,
            self.inflector.clone(),
        ))
    }

    fn fail(&self, error: ProviderError) -> HttpError {
        let error = error.into_http_error(self.on_session_expired.as_ref());
        tracing::warn!(
            status_code = error.status_code,
            message = %error.message,
            "operation failed"
        );
        error
    }
}

/// A mutation payload with its relation changes taken out.
struct RelationChanges {
    payload: Value,
    connect: Option<Value>,
    disconnect: Option<Value>,
}

impl RelationChanges {
    fn split(variables: Value) -> Self {
        match variables {
            Value::Object(mut payload) => {
                let connect = payload.remove("connect");
                let disconnect = payload.remove("disconnect");
                Self {
                    payload: Value::Object(payload),
                    connect,
                    disconnect,
                }
            }
            payload => Self {
                payload,
                connect: None,
                disconnect: None,
            },
        }
    }
}

fn records(data: Value) -> Vec<Value> {
    match data {
        Value::Array(records) => records,
        Value::Object(object) if object.is_empty() => Vec::new(),
        record => vec![record],
    }
}
