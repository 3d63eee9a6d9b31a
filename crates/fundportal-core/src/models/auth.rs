use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::first_string;
use crate::api::ApiError;

/// Tokens carried by a login response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Read a login body that may use either snake_case or camelCase keys
    pub fn from_login_response(value: &Value) -> Option<Self> {
        let access_token = first_string(value, &["access_token", "accessToken"])?;
        let refresh_token = first_string(value, &["refresh_token", "refreshToken"]);
        Some(Self {
            access_token,
            refresh_token,
        })
    }

    /// Read the new access token from a refresh body (`access` or `accessToken`)
    pub fn access_from_refresh_response(value: &Value) -> Option<String> {
        first_string(value, &["access", "accessToken", "access_token"])
    }
}

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Serialize)]
pub struct LogoutRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<&'a str>,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub nit: String,
    pub email: String,
    pub phone: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("full_name", &self.full_name)
            .field("nit", &self.nit)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration input as the user enters it, before it is sent.
#[derive(Clone, Default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub nit: String,
    pub email: String,
    pub phone: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub accept_terms: bool,
}

impl RegistrationForm {
    /// Check the form locally and strip the confirmation-only fields.
    /// Errors are keyed by field name.
    pub fn into_request(self) -> Result<RegisterRequest, ApiError> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut require = |field: &str, value: &str| {
            if value.trim().is_empty() {
                errors
                    .entry(field.to_string())
                    .or_default()
                    .push("This field is required".to_string());
            }
        };

        require("full_name", &self.full_name);
        require("nit", &self.nit);
        require("email", &self.email);
        require("phone", &self.phone);
        require("username", &self.username);
        require("password", &self.password);

        let email = self.email.trim();
        if !email.is_empty() && !looks_like_email(email) {
            errors
                .entry("email".to_string())
                .or_default()
                .push("Enter a valid email address".to_string());
        }
        if self.password != self.confirm_password {
            errors
                .entry("confirm_password".to_string())
                .or_default()
                .push("Passwords do not match".to_string());
        }
        if !self.accept_terms {
            errors
                .entry("accept_terms".to_string())
                .or_default()
                .push("You must accept the terms and conditions".to_string());
        }

        if !errors.is_empty() {
            return Err(ApiError::InvalidInput(errors));
        }

        Ok(RegisterRequest {
            full_name: self.full_name.trim().to_string(),
            nit: self.nit.trim().to_string(),
            email: email.to_string(),
            phone: self.phone.trim().to_string(),
            username: self.username.trim().to_string(),
            password: self.password,
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filled_form() -> RegistrationForm {
        RegistrationForm {
            full_name: "Ana Gómez".to_string(),
            nit: "900123456".to_string(),
            email: " ana@example.com ".to_string(),
            phone: "3001234567".to_string(),
            username: "ana".to_string(),
            password: "s3cret!".to_string(),
            confirm_password: "s3cret!".to_string(),
            accept_terms: true,
        }
    }

    #[test]
    fn test_token_pair_from_login_response() {
        let pair = TokenPair::from_login_response(&json!({
            "access_token": "a.b.c",
            "refresh_token": "x.y.z"
        }))
        .unwrap();
        assert_eq!(pair.access_token, "a.b.c");
        assert_eq!(pair.refresh_token.as_deref(), Some("x.y.z"));

        let pair = TokenPair::from_login_response(&json!({"accessToken": "acc"})).unwrap();
        assert_eq!(pair.access_token, "acc");
        assert_eq!(pair.refresh_token, None);

        assert!(TokenPair::from_login_response(&json!({})).is_none());
        assert!(TokenPair::from_login_response(&json!({"refresh_token": "x"})).is_none());
    }

    #[test]
    fn test_access_from_refresh_response() {
        assert_eq!(
            TokenPair::access_from_refresh_response(&json!({"access": "new"})).as_deref(),
            Some("new")
        );
        assert_eq!(
            TokenPair::access_from_refresh_response(&json!({"accessToken": "new2"})).as_deref(),
            Some("new2")
        );
        assert_eq!(TokenPair::access_from_refresh_response(&json!({"detail": "ok"})), None);
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(LoginRequest {
            username: "ana",
            password: "pw",
        })
        .unwrap();
        assert_eq!(body, json!({"username": "ana", "password": "pw"}));

        let body = serde_json::to_value(RefreshRequest { refresh: "r" }).unwrap();
        assert_eq!(body, json!({"refresh": "r"}));

        let body = serde_json::to_value(LogoutRequest {
            refresh_token: Some("r"),
        })
        .unwrap();
        assert_eq!(body, json!({"refreshToken": "r"}));
    }

    #[test]
    fn test_registration_form_valid() {
        let request = filled_form().into_request().unwrap();
        assert_eq!(request.email, "ana@example.com");
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("confirm_password").is_none());
        assert!(body.get("accept_terms").is_none());
        assert_eq!(body["full_name"], "Ana Gómez");
        assert!(!format!("{:?}", request).contains("s3cret"));
    }

    #[test]
    fn test_registration_form_errors() {
        let mut form = filled_form();
        form.confirm_password = "other".to_string();
        form.accept_terms = false;
        form.email = "not-an-email".to_string();
        form.nit = " ".to_string();

        match form.into_request().unwrap_err() {
            ApiError::InvalidInput(errors) => {
                assert!(errors.contains_key("confirm_password"));
                assert!(errors.contains_key("accept_terms"));
                assert!(errors.contains_key("email"));
                assert!(errors.contains_key("nit"));
                assert!(!errors.contains_key("username"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
