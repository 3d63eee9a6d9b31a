//! Data models for the portal backend.
//!
//! - `TokenPair`, `LoginRequest`, `RegisterRequest`: authentication payloads
//! - `ClientInfo`: account snapshot with balance
//! - `Fund`: subscribable investment funds
//! - `Subscription`, `SubscriptionRequest`: subscription history and creation

pub mod auth;
pub mod client;
pub mod fund;
pub mod subscription;

use serde_json::Value;

pub use auth::{LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, RegistrationForm, TokenPair};
pub use client::ClientInfo;
pub use fund::Fund;
pub use subscription::{NotificationPreference, Subscription, SubscriptionRequest, TransactionType};

/// Keys a list endpoint may wrap its array under
const LIST_ENVELOPE_KEYS: &[&str] = &["items", "results", "data", "funds", "subscriptions"];

/// Pull the record array out of a list response: either a bare array or an
/// object carrying it under one of the envelope keys.
pub(crate) fn extract_list(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => LIST_ENVELOPE_KEYS.iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

/// First non-empty string value among `keys`
pub(crate) fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_list_shapes() {
        assert_eq!(extract_list(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(extract_list(json!({"items": [1]})).unwrap().len(), 1);
        assert_eq!(extract_list(json!({"results": [1, 2, 3]})).unwrap().len(), 3);
        assert_eq!(extract_list(json!({"data": []})).unwrap().len(), 0);
        assert_eq!(extract_list(json!({"funds": [1]})).unwrap().len(), 1);
        // Non-array under an envelope key falls through to the next key
        assert_eq!(extract_list(json!({"items": null, "data": [1]})).unwrap().len(), 1);
        assert!(extract_list(json!({"count": 3})).is_none());
        assert!(extract_list(json!("nope")).is_none());
    }

    #[test]
    fn test_first_string() {
        let v = json!({"access": "", "accessToken": "tok"});
        assert_eq!(first_string(&v, &["access", "accessToken"]).as_deref(), Some("tok"));
        assert_eq!(first_string(&v, &["missing"]), None);
        assert_eq!(first_string(&json!({"access": 5}), &["access"]), None);
    }
}
