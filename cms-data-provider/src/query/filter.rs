//! Filter conditions and their compilation into the backend's where-tree.

use displaydoc::Display;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use thiserror::Error;

use super::FieldMarkers;
use crate::json_ext::merge_objects;
use crate::json_ext::single_entry;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A declarative filter condition as submitted by the UI.
///
/// Every part is optional on the wire: forms routinely submit partial filters, and the
/// compiler decides what to do with them. An absent `value` differs from `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CrudFilter {
    /// Field path, e.g. `data.title`, `relation.author.name` or `_key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Backend operator (`eq`, `contains`, ...) or a logical `and` / `or`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Operand. For logical operators, a list of conditions.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl CrudFilter {
    /// `field operator value`
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            operator: Some(operator.into()),
            value: Some(value.into()),
        }
    }

    /// Any of `conditions` must hold.
    pub fn or(conditions: Vec<CrudFilter>) -> Self {
        Self::logical("or", conditions)
    }

    /// All of `conditions` must hold.
    pub fn and(conditions: Vec<CrudFilter>) -> Self {
        Self::logical("and", conditions)
    }

    fn logical(operator: &str, conditions: Vec<CrudFilter>) -> Self {
        Self {
            field: None,
            operator: Some(operator.to_string()),
            value: Some(Value::Array(
                conditions.into_iter().map(CrudFilter::into_value).collect(),
            )),
        }
    }

    fn into_value(self) -> Value {
        let mut object = Object::new();
        if let Some(field) = self.field {
            object.insert("field".to_string(), Value::String(field));
        }
        if let Some(operator) = self.operator {
            object.insert("operator".to_string(), Value::String(operator));
        }
        if let Some(value) = self.value {
            object.insert("value".to_string(), value);
        }
        Value::Object(object)
    }

    fn operator_and_value(&self) -> Result<(&str, &Value), MalformedReason> {
        let operator = self
            .operator
            .as_deref()
            .ok_or(MalformedReason::MissingOperator)?;
        let value = self.value.as_ref().ok_or(MalformedReason::MissingValue)?;
        Ok((operator, value))
    }

    fn parts(&self) -> Result<(&str, &str, &Value), MalformedReason> {
        let (operator, value) = self.operator_and_value()?;
        let field = self.field.as_deref().ok_or(MalformedReason::MissingField)?;
        Ok((field, operator, value))
    }
}

/// How malformed conditions are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompileMode {
    /// Malformed conditions are skipped and reported as warnings.
    #[default]
    BestEffort,
    /// The first malformed condition fails the compilation.
    Strict,
}

/// Why a condition was skipped.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum MalformedReason {
    /// the operator is missing
    MissingOperator,
    /// the value is missing
    MissingValue,
    /// the field is missing
    MissingField,
    /// the value of a logical condition is not a list of conditions
    InvalidLogicalValue,
    /// the nested condition is not an object
    InvalidSubCondition,
}

/// A condition the compiler skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterWarning {
    /// Position of the condition, `2` or `2.0` for nested conditions.
    pub path: String,
    /// What was wrong with it.
    pub reason: MalformedReason,
}

/// Filter compilation errors.
#[derive(Clone, Debug, Error, Display, PartialEq, Eq)]
pub enum FilterError {
    /// malformed filter condition at {path}: {reason}
    MalformedCondition {
        /// Position of the condition.
        path: String,
        /// What was wrong with it.
        reason: MalformedReason,
    },
}

/// The variables derived from a list of conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledFilters {
    /// The main where-tree.
    pub where_clause: Object,
    /// Condition on the reserved key, sent in its own variable.
    pub key_condition: Option<Object>,
    /// Conditions on related entities, sent in their own variable.
    pub relation_condition: Option<Object>,
    /// Conditions that were skipped.
    pub warnings: Vec<FilterWarning>,
}

impl CompiledFilters {
    /// Merge a caller supplied relation seed underneath the compiled relation condition.
    ///
    /// Compiled entries win over the seed on conflicting leaves.
    pub fn seed_relation(&mut self, seed: Object) {
        let mut relation = seed;
        if let Some(compiled) = self.relation_condition.take() {
            merge_objects(&mut relation, compiled);
        }
        self.relation_condition = Some(relation);
    }

    fn skip(&mut self, path: String, reason: MalformedReason) {
        tracing::debug!(%path, %reason, "skipping malformed filter condition");
        self.warnings.push(FilterWarning { path, reason });
    }
}

/// Compiles [`CrudFilter`]s into a where-tree and the dedicated key and relation variables.
#[derive(Clone, Debug, Default)]
pub struct FilterCompiler {
    markers: FieldMarkers,
    mode: CompileMode,
}

impl FilterCompiler {
    /// A compiler using `markers` in the given `mode`.
    pub fn new(markers: FieldMarkers, mode: CompileMode) -> Self {
        Self { markers, mode }
    }

    /// A strict compiler with default markers.
    pub fn strict() -> Self {
        Self::new(FieldMarkers::default(), CompileMode::Strict)
    }

    /// The field markers in use.
    pub fn markers(&self) -> &FieldMarkers {
        &self.markers
    }

    /// Compile `conditions`, in order.
    ///
    /// Direct field conditions overwrite earlier ones on the same field. Logical groups
    /// accumulate under a single `AND` / `OR` key.
    pub fn compile(&self, conditions: &[CrudFilter]) -> Result<CompiledFilters, FilterError> {
        let mut compiled = CompiledFilters::default();
        for (position, condition) in conditions.iter().enumerate() {
            self.compile_condition(condition, position.to_string(), &mut compiled);
        }

        if self.mode == CompileMode::Strict {
            if let Some(warning) = compiled.warnings.first() {
                return Err(FilterError::MalformedCondition {
                    path: warning.path.clone(),
                    reason: warning.reason,
                });
            }
        }
        Ok(compiled)
    }

    fn compile_condition(
        &self,
        condition: &CrudFilter,
        path: String,
        compiled: &mut CompiledFilters,
    ) {
        let (operator, value) = match condition.operator_and_value() {
            Ok(parts) => parts,
            Err(reason) => return compiled.skip(path, reason),
        };

        if let Some(group) = logical_group(operator) {
            return self.compile_group(group, value, path, compiled);
        }

        let Some(field) = condition.field.as_deref() else {
            return compiled.skip(path, MalformedReason::MissingField);
        };

        if operator == "eq" {
            if let Some(nested) = nested_conditions(value) {
                return self.compile_nested(field, nested, path, compiled);
            }
        }

        if field == self.markers.reserved_key {
            let mut key = Object::new();
            key.insert(operator.to_string(), value.clone());
            compiled.key_condition = Some(key);
            return;
        }

        if let Some(relation_path) = self.markers.relation_path(field) {
            if relation_path.split('.').any(str::is_empty) {
                return compiled.skip(path, MalformedReason::MissingField);
            }
            let leaf = single_entry(operator, value.clone());
            let tree = relation_path
                .rsplit('.')
                .fold(leaf, |node, segment| single_entry(segment, node));
            if let Value::Object(tree) = tree {
                merge_objects(
                    compiled.relation_condition.get_or_insert_with(Object::new),
                    tree,
                );
            }
            return;
        }

        compiled.where_clause.insert(
            self.markers.strip_namespace(field).to_string(),
            single_entry(operator, value.clone()),
        );
    }

    // `{field: "author", operator: "eq", value: [{field: "name", operator: "eq", value: "a"}]}`
    // becomes `where.author = {name: {eq: "a"}}`.
    fn compile_nested(
        &self,
        field: &str,
        nested: Vec<CrudFilter>,
        path: String,
        compiled: &mut CompiledFilters,
    ) {
        let mut tree = Object::new();
        for (index, condition) in nested.iter().enumerate() {
            match condition.parts() {
                Ok((sub_field, sub_operator, sub_value)) => {
                    merge_objects(
                        &mut tree,
                        [(
                            sub_field.to_string(),
                            single_entry(sub_operator, sub_value.clone()),
                        )]
                        .into_iter()
                        .collect(),
                    );
                }
                Err(reason) => compiled.skip(format!("{path}.{index}"), reason),
            }
        }

        compiled.where_clause.insert(
            self.markers.strip_namespace(field).to_string(),
            Value::Object(tree),
        );
    }

    fn compile_group(
        &self,
        group: &'static str,
        value: &Value,
        path: String,
        compiled: &mut CompiledFilters,
    ) {
        let Some(items) = value.as_array() else {
            return compiled.skip(path, MalformedReason::InvalidLogicalValue);
        };

        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let item_path = format!("{path}.{index}");
            let condition = match serde_json::from_value::<CrudFilter>(item.clone()) {
                Ok(condition) => condition,
                Err(_) => {
                    compiled.skip(item_path, MalformedReason::InvalidSubCondition);
                    continue;
                }
            };
            match condition.parts() {
                Ok((field, operator, value)) => entries.push(single_entry(
                    self.markers.strip_namespace(field),
                    single_entry(operator, value.clone()),
                )),
                Err(reason) => compiled.skip(item_path, reason),
            }
        }

        if entries.is_empty() {
            return;
        }
        match compiled.where_clause.get_mut(group) {
            Some(Value::Array(existing)) => existing.extend(entries),
            _ => {
                compiled
                    .where_clause
                    .insert(group.to_string(), Value::Array(entries));
            }
        }
    }
}

fn logical_group(operator: &str) -> Option<&'static str> {
    if operator.eq_ignore_ascii_case("or") {
        Some("OR")
    } else if operator.eq_ignore_ascii_case("and") {
        Some("AND")
    } else {
        None
    }
}

// A non-empty array made only of objects carrying a `field` is a list of nested conditions.
fn nested_conditions(value: &Value) -> Option<Vec<CrudFilter>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| {
            item.as_object()
                .filter(|object| object.contains_key("field"))
                .and_then(|_| serde_json::from_value::<CrudFilter>(item.clone()).ok())
        })
        .collect()
}
