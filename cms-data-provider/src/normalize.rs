//! Extraction of operation results from backend responses.
//!
//! The backend reports some failures inside nominally successful payloads: an `errors`
//! array next to the data, or under the root field itself. Those are surfaced as
//! [`ProviderError::Payload`] before anything is extracted.

use crate::document::synthesize::Envelope;
use crate::error::ProviderError;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::services::ClientError;

/// Check `response` for failures, then return its data.
///
/// `key` is the root field the operation reads, also checked for embedded errors.
pub fn into_data(response: graphql::Response, key: Option<&str>) -> Result<Value, ProviderError> {
    if !response.errors.is_empty() {
        return Err(ProviderError::Transport(ClientError::graphql(
            response.errors,
        )));
    }

    let data = response
        .data
        .unwrap_or_else(|| Value::Object(Object::new()));

    if let Some(errors) = embedded_errors(data.get("errors")) {
        return Err(ProviderError::Payload { errors });
    }
    if let Some(errors) = key.and_then(|key| embedded_errors(data.get(key)?.get("errors"))) {
        return Err(ProviderError::Payload { errors });
    }
    Ok(data)
}

fn embedded_errors(value: Option<&Value>) -> Option<Vec<graphql::Error>> {
    let errors = value?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|error| match error {
                Value::String(message) => graphql::Error::new(message.as_str()),
                Value::Object(_) => serde_json::from_value(error.clone())
                    .unwrap_or_else(|_| graphql::Error::new(error.to_string())),
                other => graphql::Error::new(other.to_string()),
            })
            .collect(),
    )
}

/// A page of records and, when the response carries one, the reported total.
///
/// The total is read from `data[count_key].total` and never derived from the page.
pub fn extract_list(
    data: &Value,
    list_key: &str,
    count_key: Option<&str>,
) -> Result<(Vec<Value>, Option<u64>), ProviderError> {
    let records = match data.get(list_key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(records)) => records.clone(),
        Some(_) => {
            return Err(ProviderError::MalformedResponse {
                reason: format!("expected `{list_key}` to be a list"),
            })
        }
    };
    let total = count_key
        .and_then(|count_key| data.get(count_key))
        .and_then(|count| count.get("total"))
        .and_then(Value::as_u64);
    Ok((records, total))
}

/// The record under `key`, `{}` when absent.
pub fn extract_one(data: &Value, key: &str, envelope: Envelope) -> Value {
    let root = data.get(key);
    let record = match envelope {
        Envelope::Direct => root,
        Envelope::Data => root.and_then(|root| root.get("data")),
    };
    match record {
        None | Some(Value::Null) => Value::Object(Object::new()),
        Some(record) => record.clone(),
    }
}
