use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::claims::{TokenClaims, UserIdentity};
use super::store::{TokenKind, TokenStore};
use crate::api::ApiError;
use crate::models::TokenPair;

/// Externally observable authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
            SessionState::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Trim a token and strip a leading `Bearer ` scheme.
/// Returns None for empty tokens or tokens with interior whitespace.
pub(crate) fn normalize_token(token: &str) -> Option<&str> {
    let mut token = token.trim();
    if let Some(scheme) = token.get(..7) {
        if scheme.eq_ignore_ascii_case("bearer ") {
            token = token[7..].trim_start();
        }
    }
    if token.is_empty() || token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    Some(token)
}

/// Owns the access/refresh token pair.
///
/// The persisted tokens are the only state: every query goes back to the
/// store, so several managers over one store always agree. Clone is cheap
/// and shares the store.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    fn read(&self, kind: TokenKind) -> Option<String> {
        match self.store.get(kind) {
            Ok(token) => token,
            Err(e) => {
                warn!(key = kind.key(), error = %e, "Failed to read token");
                None
            }
        }
    }

    fn write(&self, kind: TokenKind, token: &str) -> bool {
        let Some(token) = normalize_token(token) else {
            warn!(key = kind.key(), "Attempted to set an empty or malformed token");
            return false;
        };
        match self.store.set(kind, token) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = kind.key(), error = %e, "Failed to persist token");
                false
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(TokenKind::Access)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(TokenKind::Refresh)
    }

    /// Persist a new access token. Empty or malformed tokens are logged and
    /// ignored; returns whether the token was stored.
    pub fn set_access_token(&self, token: &str) -> bool {
        self.write(TokenKind::Access, token)
    }

    /// Persist a new refresh token. Same rules as `set_access_token`.
    pub fn set_refresh_token(&self, token: &str) -> bool {
        self.write(TokenKind::Refresh, token)
    }

    pub fn clear_tokens(&self) {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            if let Err(e) = self.store.remove(kind) {
                warn!(key = kind.key(), error = %e, "Failed to remove token");
            }
        }
    }

    /// True iff an access token is present and, when it decodes as a JWT
    /// with an `exp` claim, not yet expired.
    pub fn is_authenticated(&self) -> bool {
        match self.access_token() {
            Some(token) => TokenClaims::decode(&token)
                .map(|claims| !claims.is_expired())
                .unwrap_or(true),
            None => false,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// App-start check of the persisted tokens.
    pub fn rehydrate(&self) -> SessionState {
        let state = self.state();
        debug!(%state, has_refresh = self.refresh_token().is_some(), "Session rehydrated");
        state
    }

    /// Establish a session from a login response body.
    ///
    /// Accepts both `access_token`/`accessToken` and
    /// `refresh_token`/`refreshToken`. Fails with `InvalidLoginResponse`
    /// without touching the stored tokens when no usable access token is
    /// present.
    pub fn login(&self, response: &Value) -> Result<(), ApiError> {
        let pair = TokenPair::from_login_response(response).ok_or_else(|| {
            ApiError::InvalidLoginResponse("no access token in login response".to_string())
        })?;

        let access = normalize_token(&pair.access_token).ok_or_else(|| {
            ApiError::InvalidLoginResponse("malformed access token in login response".to_string())
        })?;

        self.store
            .set(TokenKind::Access, access)
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        match pair.refresh_token.as_deref().and_then(normalize_token) {
            Some(refresh) => self
                .store
                .set(TokenKind::Refresh, refresh)
                .map_err(|e| ApiError::Storage(e.to_string()))?,
            None => {
                // A refresh token left over from an earlier login must not
                // be paired with the new access token
                debug!("Login response carried no refresh token");
                if let Err(e) = self.store.remove(TokenKind::Refresh) {
                    warn!(error = %e, "Failed to remove stale refresh token");
                }
            }
        }

        info!(user = %self.user().display_name(), "Session established");
        Ok(())
    }

    /// Clear local tokens. Navigation back to login is the caller's job.
    pub fn logout(&self) {
        self.clear_tokens();
        info!("Session cleared");
    }

    /// Best-effort identity from the access token, for display only
    pub fn user(&self) -> UserIdentity {
        self.access_token()
            .map(|token| UserIdentity::from_token(&token))
            .unwrap_or_else(UserIdentity::placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::tests::make_token;
    use crate::auth::MemoryTokenStore;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemoryTokenStore::new()))
    }

    #[test]
    fn test_access_token_round_trip() {
        let session = manager();
        for token in ["a.b.c", "opaque", "eyJhbGciOi.eyJzdWIiOi.sig", "tok_123-456"] {
            assert!(session.set_access_token(token));
            assert_eq!(session.access_token().as_deref(), Some(token));
        }
    }

    #[test]
    fn test_empty_or_malformed_tokens_are_ignored() {
        let session = manager();
        session.set_access_token("good");
        assert!(!session.set_access_token(""));
        assert!(!session.set_access_token("   "));
        assert!(!session.set_access_token("two words"));
        assert!(!session.set_refresh_token(""));
        assert_eq!(session.access_token().as_deref(), Some("good"));
        assert_eq!(session.refresh_token(), None);
    }

    #[test]
    fn test_bearer_prefix_is_stripped() {
        let session = manager();
        assert!(session.set_access_token("Bearer abc.def.ghi"));
        assert_eq!(session.access_token().as_deref(), Some("abc.def.ghi"));
        assert_eq!(normalize_token("bearer  xyz "), Some("xyz"));
        assert_eq!(normalize_token("Bearer \t "), Some("Bearer"));
    }

    #[test]
    fn test_clear_tokens_is_idempotent() {
        let session = manager();
        session.set_access_token("a.b.c");
        session.set_refresh_token("x.y.z");
        assert!(session.is_authenticated());

        session.clear_tokens();
        assert!(!session.is_authenticated());
        assert_eq!(session.refresh_token(), None);

        session.clear_tokens();
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_login_snake_case() {
        let session = manager();
        session
            .login(&json!({"access_token": "a.b.c", "refresh_token": "x.y.z"}))
            .unwrap();
        assert_eq!(session.access_token().as_deref(), Some("a.b.c"));
        assert_eq!(session.refresh_token().as_deref(), Some("x.y.z"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_login_camel_case() {
        let session = manager();
        session
            .login(&json!({"accessToken": "acc", "refreshToken": "ref"}))
            .unwrap();
        assert_eq!(session.access_token().as_deref(), Some("acc"));
        assert_eq!(session.refresh_token().as_deref(), Some("ref"));
        assert_eq!(session.rehydrate(), SessionState::Authenticated);
    }

    #[test]
    fn test_login_without_access_token_keeps_prior_session() {
        let session = manager();
        session.set_access_token("old-access");
        session.set_refresh_token("old-refresh");

        let err = session.login(&json!({})).unwrap_err();
        assert!(matches!(err, ApiError::InvalidLoginResponse(_)));

        let err = session.login(&json!({"access_token": "  "})).unwrap_err();
        assert!(matches!(err, ApiError::InvalidLoginResponse(_)));

        assert_eq!(session.access_token().as_deref(), Some("old-access"));
        assert_eq!(session.refresh_token().as_deref(), Some("old-refresh"));
    }

    #[test]
    fn test_login_without_refresh_drops_stale_refresh() {
        let session = manager();
        session.set_refresh_token("stale");
        session.login(&json!({"access_token": "fresh"})).unwrap();
        assert_eq!(session.refresh_token(), None);
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_expired_jwt_is_not_authenticated() {
        let session = manager();
        session.set_access_token(&make_token(r#"{"sub":"1","exp":1000}"#));
        assert!(session.access_token().is_some());
        assert!(!session.is_authenticated());

        session.set_access_token(&make_token(r#"{"sub":"1","exp":4102444800}"#));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_logout_and_user() {
        let session = manager();
        assert!(session.user().is_placeholder());

        session.set_access_token(&make_token(r#"{"email":"ana@example.com"}"#));
        assert_eq!(session.user().display_name(), "ana@example.com");

        session.logout();
        assert!(!session.is_authenticated());
        assert!(session.user().is_placeholder());
    }

    #[test]
    fn test_managers_share_store() {
        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let a = SessionManager::new(Arc::clone(&store));
        let b = SessionManager::new(store);
        a.set_access_token("shared");
        assert_eq!(b.access_token().as_deref(), Some("shared"));
        b.logout();
        assert!(!a.is_authenticated());
    }
}
