use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Page requested by the caller. Either naming convention is accepted on input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    /// 1-based page index.
    #[serde(alias = "page")]
    pub current: Option<u64>,
    /// Number of records per page.
    #[serde(alias = "size")]
    pub page_size: Option<u64>,
}

impl Pagination {
    /// Page `current` of `page_size` records.
    pub fn new(current: u64, page_size: u64) -> Self {
        Self {
            current: Some(current),
            page_size: Some(page_size),
        }
    }

    /// Resolve the page and size, falling back on `defaults` for what is absent.
    pub fn resolve(&self, defaults: &PaginationDefaults) -> (u64, u64) {
        (
            self.current.unwrap_or(defaults.page),
            self.page_size.unwrap_or(defaults.size),
        )
    }
}

/// Page and size used when the caller does not supply one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct PaginationDefaults {
    /// default: 1
    pub page: u64,
    /// default: 10
    pub size: u64,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        let pagination = Pagination::default();
        assert_eq!(pagination.resolve(&PaginationDefaults::default()), (1, 10));
    }

    #[test]
    fn both_naming_conventions_are_accepted() {
        let a: Pagination = serde_json::from_value(json!({"current": 3, "pageSize": 25})).unwrap();
        let b: Pagination = serde_json::from_value(json!({"page": 3, "size": 25})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.resolve(&PaginationDefaults::default()), (3, 25));
    }

    #[test]
    fn partial_pagination() {
        let pagination: Pagination = serde_json::from_value(json!({"page": 2})).unwrap();
        assert_eq!(pagination.resolve(&PaginationDefaults::default()), (2, 10));
    }
}
