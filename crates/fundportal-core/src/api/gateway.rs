//! The single chokepoint for backend calls.
//!
//! `Gateway::request` attaches the current access token and, when the
//! backend answers 401, refreshes the token and retries the original
//! request exactly once. Token-lifecycle failures clear the session before
//! they reach the caller.

use std::sync::Arc;

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::ApiError;
use crate::auth::session::normalize_token;
use crate::auth::SessionManager;
use crate::models::{RefreshRequest, TokenPair};

/// Default refresh endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh-token";

/// Path fragments that identify a refresh endpoint. A 401 from one of
/// these never triggers another refresh.
const REFRESH_PATH_MARKERS: &[&str] = &["refresh-token", "token/refresh"];

pub struct Gateway {
    transport: Arc<dyn Transport>,
    session: SessionManager,
    base_url: String,
    refresh_path: String,
    // Serializes refreshes so concurrent 401s share one refresh call
    refresh_lock: Mutex<()>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, session: SessionManager, base_url: &str) -> Self {
        Self {
            transport,
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Use a different refresh endpoint (e.g. `/api/auth/token/refresh/`)
    pub fn with_refresh_path(mut self, path: &str) -> Self {
        self.refresh_path = path.to_string();
        self
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn is_refresh_path(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.trim_end_matches('/') == self.refresh_path.trim_end_matches('/')
            || REFRESH_PATH_MARKERS.iter().any(|marker| path.contains(marker))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        self.transport
            .send(HttpRequest {
                method,
                url: self.url(path),
                bearer: bearer.map(str::to_string),
                body: body.cloned(),
            })
            .await
    }

    /// Accept 2xx; 403 clears the session; everything else becomes an error
    /// carrying the original status and body.
    fn check(&self, path: &str, response: HttpResponse) -> Result<HttpResponse, ApiError> {
        if response.is_success() {
            return Ok(response);
        }
        if response.status == 403 {
            warn!(path, "Forbidden, clearing session");
            self.session.clear_tokens();
        } else {
            debug!(path, status = response.status, "Request failed");
        }
        Err(ApiError::from_status(response.status, &response.body))
    }

    /// Authenticated request with refresh-on-401 and a single retry.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponse, ApiError> {
        let token = self.session.access_token();
        let response = self
            .send(method.clone(), path, body, token.as_deref())
            .await?;

        if response.status != 401 || self.is_refresh_path(path) {
            return self.check(path, response);
        }

        debug!(path, "Unauthorized, refreshing access token");
        let fresh = self.refresh_access_token(token.as_deref()).await?;

        // The retry is final: a second 401 propagates to the caller
        let retried = self.send(method, path, body, Some(&fresh)).await?;
        self.check(path, retried)
    }

    /// Authenticated request without the refresh retry. Used for best-effort
    /// calls such as logout.
    pub async fn request_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponse, ApiError> {
        let token = self.session.access_token();
        let response = self.send(method, path, body, token.as_deref()).await?;
        self.check(path, response)
    }

    /// Unauthenticated request (login, registration). Never attaches
    /// credentials and never refreshes.
    pub async fn request_public(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponse, ApiError> {
        let response = self.send(method, path, body, None).await?;
        self.check(path, response)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = to_value(body)?;
        self.request(Method::POST, path, Some(&body)).await?.json()
    }

    /// Obtain a usable access token after `stale` was rejected.
    ///
    /// If another request rotated the token while this one waited for the
    /// lock, the rotated token is returned without calling the backend.
    /// Any failure clears the session and yields `SessionExpired`, except a
    /// 403 from the refresh endpoint, which surfaces as `Forbidden`.
    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.session.access_token() {
            if stale != Some(current.as_str()) {
                debug!("Access token already rotated by a concurrent refresh");
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            warn!("No refresh token available, ending session");
            self.session.logout();
            return Err(ApiError::SessionExpired);
        };

        match self.call_refresh(&refresh_token).await {
            Ok(access) => {
                if self.session.set_access_token(&access) {
                    info!("Access token refreshed");
                    Ok(access)
                } else {
                    self.session.clear_tokens();
                    Err(ApiError::SessionExpired)
                }
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.session.clear_tokens();
                match e {
                    ApiError::Forbidden(_) => Err(e),
                    _ => Err(ApiError::SessionExpired),
                }
            }
        }
    }

    /// POST the refresh token and return the normalized new access token.
    /// A rotated refresh token in the reply is stored as well.
    async fn call_refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let body = to_value(&RefreshRequest {
            refresh: refresh_token,
        })?;
        let response = self
            .send(Method::POST, &self.refresh_path, Some(&body), None)
            .await?;

        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }

        let value = response.value()?;
        let access = TokenPair::access_from_refresh_response(&value)
            .as_deref()
            .and_then(normalize_token)
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("no access token in refresh response".to_string()))?;

        if let Some(rotated) = crate::models::first_string(&value, &["refresh", "refreshToken", "refresh_token"]) {
            self.session.set_refresh_token(&rotated);
        }

        Ok(access)
    }
}

fn to_value<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::InvalidResponse(format!("failed to encode request body: {}", e)))
}
