//! Compilation of list parameters (filters, sorters, pagination) into GraphQL variables.

pub mod filter;
pub mod pagination;
pub mod sort;

/// Field markers recognized by the filter compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMarkers {
    /// Prefix stripped from field paths, the payload nesting being implicit in the backend.
    pub namespace_prefix: String,

    /// Prefix routing a condition into the relation filter variable.
    pub relation_prefix: String,

    /// Field routed into the dedicated key lookup variable.
    pub reserved_key: String,
}

impl Default for FieldMarkers {
    fn default() -> Self {
        Self {
            namespace_prefix: "data.".to_string(),
            relation_prefix: "relation.".to_string(),
            reserved_key: "_key".to_string(),
        }
    }
}

impl FieldMarkers {
    pub(crate) fn strip_namespace<'a>(&self, field: &'a str) -> &'a str {
        field
            .strip_prefix(self.namespace_prefix.as_str())
            .unwrap_or(field)
    }

    pub(crate) fn relation_path<'a>(&self, field: &'a str) -> Option<&'a str> {
        field.strip_prefix(self.relation_prefix.as_str())
    }
}
