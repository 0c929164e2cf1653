//! Per-call options accepted by every provider operation.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::document::synthesize::Projection;
use crate::json_ext::Object;

/// Options shaping the document sent for a single call.
///
/// Deserializes from the camelCase keys UI frameworks send, including their legacy aliases.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaQuery {
    /// Leaf fields to select under the entity's `data` envelope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    /// Output key to literal sub-selection of a related entity.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub connection_fields: IndexMap<String, String>,

    /// Output key to the backend field holding the relation.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub alias_fields: IndexMap<String, String>,

    /// Relation filter seed, merged underneath the compiled relation conditions.
    #[serde(alias = "connection", skip_serializing_if = "Option::is_none")]
    pub reverse_lookup: Option<Object>,

    /// Raw query document, used instead of a synthesized one.
    #[serde(alias = "query", skip_serializing_if = "Option::is_none")]
    pub gql_query: Option<String>,

    /// Raw mutation document, used instead of a synthesized one.
    #[serde(alias = "mutation", skip_serializing_if = "Option::is_none")]
    pub gql_mutation: Option<String>,

    /// Variables sent with a raw document.
    #[serde(alias = "gqlVariables", skip_serializing_if = "Option::is_none")]
    pub variables: Option<Object>,

    /// Root field the result is read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_key: Option<String>,

    /// Only update the fields present in the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_update: Option<bool>,
}

impl MetaQuery {
    pub(crate) fn projection(&self) -> Projection {
        let mut projection = Projection {
            connection_fields: self.connection_fields.clone(),
            alias_fields: self.alias_fields.clone(),
            ..Default::default()
        };
        if let Some(fields) = self.fields.as_ref().filter(|fields| !fields.is_empty()) {
            projection.fields = fields.clone();
        }
        projection
    }

    /// The raw document supplied by the caller, if any, and the variables to send with it.
    pub(crate) fn raw_document(&self) -> Option<(&str, Object)> {
        let document = self.gql_query.as_deref().or(self.gql_mutation.as_deref())?;
        Some((document, self.variables.clone().unwrap_or_default()))
    }

    pub(crate) fn is_raw_mutation(&self) -> bool {
        self.gql_query.is_none() && self.gql_mutation.is_some()
    }
}
