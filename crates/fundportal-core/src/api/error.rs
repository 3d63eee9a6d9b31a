use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Field name -> messages, as reported by 422 responses or local form checks
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid login response: {0}")]
    InvalidLoginResponse(String),

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Access denied: {}", ApiError::truncate_body(.0))]
    Forbidden(String),

    #[error("Validation failed: {}", ApiError::summarize_fields(.fields))]
    ValidationError { fields: FieldErrors, body: String },

    /// A 4xx status the caller interprets (400, 401, 404, 409, 423, 429)
    #[error("Request failed with status {status}: {}", ApiError::truncate_body(.body))]
    Status { status: u16, body: String },

    #[error("Server error ({status}): {}", ApiError::truncate_body(.body))]
    ServerError { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {}", ApiError::summarize_fields(.0))]
    InvalidInput(FieldErrors),

    #[error("Token storage error: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    fn summarize_fields(fields: &FieldErrors) -> String {
        if fields.is_empty() {
            return "no field details".to_string();
        }
        fields
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Map a non-2xx status to an error, keeping the body intact
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            403 => ApiError::Forbidden(body.to_string()),
            422 => ApiError::ValidationError {
                fields: parse_field_errors(body),
                body: body.to_string(),
            },
            400 | 401 | 404 | 409 | 423 | 429 => ApiError::Status {
                status,
                body: body.to_string(),
            },
            _ => ApiError::ServerError {
                status,
                body: body.to_string(),
            },
        }
    }

    /// HTTP status behind this error, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Forbidden(_) => Some(403),
            ApiError::ValidationError { .. } => Some(422),
            ApiError::Status { status, .. } | ApiError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body behind this error, when one was received
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Forbidden(body)
            | ApiError::ValidationError { body, .. }
            | ApiError::Status { body, .. }
            | ApiError::ServerError { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Field-level messages from a 422 or a local form check
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::ValidationError { fields, .. } | ApiError::InvalidInput(fields) => Some(fields),
            _ => None,
        }
    }

    /// True for token-lifecycle failures: the session has been cleared and
    /// the caller must send the user back to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::Forbidden(_))
    }

    /// Server-provided message (`detail`, `message` or `error`), if any
    pub fn detail(&self) -> Option<String> {
        let body = self.body()?;
        match serde_json::from_str::<Value>(body) {
            Ok(value) => ["detail", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str))
                .map(str::to_string),
            Err(_) => {
                let text = body.trim();
                // Plain-text bodies are shown as-is unless they look like an HTML error page
                if text.is_empty() || text.starts_with('<') {
                    None
                } else {
                    Some(Self::truncate_body(text))
                }
            }
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::InvalidLoginResponse(_) => "Invalid response format from server".to_string(),
            ApiError::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            ApiError::Forbidden(_) => self
                .detail()
                .unwrap_or_else(|| "You are not authorized to perform this action".to_string()),
            ApiError::ValidationError { fields, .. } => {
                if fields.is_empty() {
                    self.detail()
                        .unwrap_or_else(|| "Some fields are invalid".to_string())
                } else {
                    Self::summarize_fields(fields)
                }
            }
            ApiError::Status { status, .. } => {
                let fallback = match status {
                    401 => "Invalid credentials",
                    404 => "The requested resource was not found",
                    409 => "A record with these details already exists",
                    423 => "Account locked. Contact the administrator",
                    429 => "Too many requests - please wait before retrying",
                    _ => "The request could not be processed. Please try again.",
                };
                // 401/423 carry fixed meanings; the server text adds nothing useful
                if matches!(status, 401 | 423) {
                    fallback.to_string()
                } else {
                    self.detail().unwrap_or_else(|| fallback.to_string())
                }
            }
            ApiError::ServerError { .. } => self
                .detail()
                .unwrap_or_else(|| "Server error. Please try again later.".to_string()),
            ApiError::NetworkError(_) => {
                "Unable to reach the server. Check your connection.".to_string()
            }
            ApiError::InvalidResponse(_) => "Unexpected response from server".to_string(),
            ApiError::InvalidInput(fields) => Self::summarize_fields(fields),
            ApiError::Storage(_) => "Could not save the session on this device".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::NetworkError(e.to_string())
        }
    }
}

fn collect_messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => item
                    .get("msg")
                    .or_else(|| item.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Extract field-level messages from a validation body.
///
/// Understands `{"errors": {field: [..]}}`, FastAPI-style
/// `{"detail": [{"loc": [.., field], "msg": ..}]}` and flat
/// `{field: [..]}` maps.
pub fn parse_field_errors(body: &str) -> FieldErrors {
    let mut fields = FieldErrors::new();
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fields;
    };

    if let Some(Value::Object(errors)) = value.get("errors") {
        for (field, messages) in errors {
            let messages = collect_messages(messages);
            if !messages.is_empty() {
                fields.entry(field.clone()).or_default().extend(messages);
            }
        }
        return fields;
    }

    if let Some(Value::Array(details)) = value.get("detail") {
        for detail in details {
            let field = detail
                .get("loc")
                .and_then(Value::as_array)
                .and_then(|loc| loc.last())
                .map(|last| match last {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "non_field_errors".to_string());
            if let Some(msg) = detail.get("msg").and_then(Value::as_str) {
                fields.entry(field).or_default().push(msg.to_string());
            }
        }
        return fields;
    }

    if let Value::Object(map) = &value {
        for (field, messages) in map {
            if matches!(field.as_str(), "detail" | "message" | "error" | "status") {
                continue;
            }
            let messages = collect_messages(messages);
            if !messages.is_empty() {
                fields.entry(field.clone()).or_default().extend(messages);
            }
        }
    }
    fields
}
