//! Resource and data source handlers.
//!
//! Each handler module owns its schema and a typed state struct, and copies
//! fields between that state and the nOps wire records. Handlers receive the
//! configured [`crate::client::NopsApi`] from the provider for every call.

pub mod integration;
pub mod notification;
pub mod project;
pub mod projects;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ProviderError;

/// `last_updated` value for the current instant, e.g.
/// `Sunday, 18-Oct-26 09:30:00 UTC`.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now()
        .format("%A, %d-%b-%y %H:%M:%S UTC")
        .to_string()
}

/// A configured string, rejecting missing and empty values.
pub(crate) fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ProviderError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ProviderError::Validation(format!(
            "Missing required attribute '{}'",
            name
        ))),
    }
}

pub(crate) fn from_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    if !value.is_object() {
        return Err(ProviderError::InvalidRequest(
            "Resource state must be an object".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_layout() {
        let ts = timestamp();
        assert!(ts.ends_with(" UTC"));
        assert!(ts.contains(", "));
        assert_eq!(ts.matches('-').count(), 2);
    }

    #[test]
    fn test_required() {
        assert_eq!(required(&Some("x".to_string()), "name").unwrap(), "x");
        assert!(matches!(
            required(&Some(String::new()), "name"),
            Err(ProviderError::Validation(_))
        ));
        assert!(required(&None, "name").is_err());
    }

    #[test]
    fn test_from_state_rejects_non_objects() {
        let err = from_state::<project::ProjectState>(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
