use serde::Deserialize;
use serde::Serialize;

use super::FieldMarkers;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// The backend's enum token.
    pub fn as_token(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A single sort entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    /// Field to sort on.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

impl Sorter {
    /// Sort on `field` in `order`.
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// Merge sorters into a single `{field: "ASC" | "DESC"}` mapping.
///
/// A field given more than once keeps the direction of its last occurrence,
/// at the position of its first occurrence.
pub fn compile_sorters(sorters: &[Sorter], markers: &FieldMarkers) -> Object {
    let mut sort = Object::new();
    for sorter in sorters {
        sort.insert(
            markers.strip_namespace(&sorter.field).to_string(),
            Value::String(sorter.order.as_token().to_string()),
        );
    }
    sort
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn duplicate_fields_last_wins() {
        let sorters = vec![
            Sorter::new("price", SortOrder::Asc),
            Sorter::new("price", SortOrder::Desc),
        ];
        let sort = compile_sorters(&sorters, &FieldMarkers::default());
        assert_eq!(Value::Object(sort), json!({"price": "DESC"}));
    }

    #[test]
    fn multiple_fields_keep_their_order() {
        let sorters = vec![
            Sorter::new("data.title", SortOrder::Asc),
            Sorter::new("createdAt", SortOrder::Desc),
        ];
        let sort = compile_sorters(&sorters, &FieldMarkers::default());
        assert_eq!(
            sort.keys().collect::<Vec<_>>(),
            vec!["title", "createdAt"]
        );
        assert_eq!(sort["title"], json!("ASC"));
    }

    #[test]
    fn sorters_deserialize_from_lowercase_orders() {
        let sorters: Vec<Sorter> =
            serde_json::from_value(json!([{"field": "name", "order": "desc"}])).unwrap();
        assert_eq!(sorters, vec![Sorter::new("name", SortOrder::Desc)]);
    }
}
