//! Performance-insensitive helpers over `serde_json` values.

pub use serde_json::Value;

/// A JSON object.
pub type Object = serde_json::Map<String, Value>;

/// Extension trait for [`serde_json::Value`].
pub trait ValueExt {
    /// Deep merge `other` into `self`.
    ///
    /// Objects are merged key by key, recursively. Any other value in `other`
    /// replaces the value in `self`.
    fn deep_merge(&mut self, other: Value);

    /// Returns `true` for `null`, `{}` and `[]`.
    fn is_empty_value(&self) -> bool;

    /// Convert an object keyed by indices (`{"0": a, "1": b}`) into an array.
    ///
    /// Numeric keys are ordered numerically and come first, the remaining
    /// keys keep their insertion order. Any value that is not an object is
    /// returned unchanged.
    fn keyed_object_into_array(self) -> Value;
}

impl ValueExt for Value {
    fn deep_merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => merge_objects(a, b),
            (a, b) => {
                *a = b;
            }
        }
    }

    fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Object(o) => o.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        }
    }

    fn keyed_object_into_array(self) -> Value {
        let object = match self {
            Value::Object(object) => object,
            other => return other,
        };

        let (mut indexed, named): (Vec<_>, Vec<_>) = object
            .into_iter()
            .map(|(key, value)| (key.parse::<u64>().ok(), value))
            .partition(|(index, _)| index.is_some());
        indexed.sort_by_key(|(index, _)| *index);

        Value::Array(
            indexed
                .into_iter()
                .chain(named)
                .map(|(_, value)| value)
                .collect(),
        )
    }
}

/// Deep merge every entry of `source` into `target`.
pub(crate) fn merge_objects(target: &mut Object, source: Object) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing) => existing.deep_merge(value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

/// Build a single-entry object `{key: value}`.
pub(crate) fn single_entry(key: impl Into<String>, value: Value) -> Value {
    let mut object = Object::new();
    object.insert(key.into(), value);
    Value::Object(object)
}
