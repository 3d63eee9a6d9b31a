//! Typed portal operations, one per backend endpoint.
//!
//! Every call goes through the `Gateway`, so credentials and refresh
//! handling are uniform.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::gateway::Gateway;
use super::transport::ReqwestTransport;
use super::{ApiError, FieldErrors};
use crate::auth::{SessionManager, TokenStore, UserIdentity};
use crate::config::Config;
use crate::models::{
    extract_list, ClientInfo, Fund, LoginRequest, LogoutRequest, NotificationPreference,
    RegisterRequest, Subscription, SubscriptionRequest,
};

// ============================================================================
// Endpoints
// ============================================================================

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";
const LOGOUT_PATH: &str = "/api/auth/logout";
const CLIENT_ME_PATH: &str = "/api/clients/me";
const FUNDS_PATH: &str = "/api/funds/funds-list";
const SUBSCRIBE_PATH: &str = "/api/subscriptions/subscriptions-new";
const SUBSCRIPTIONS_PATH: &str = "/api/subscriptions/subscriptions-list";

/// Cancel endpoint for one subscription. The id is percent-encoded as a
/// single path segment; empty and dot-segment ids are rejected.
fn cancel_path(subscription_id: &str) -> Result<String, ApiError> {
    let id = subscription_id.trim();
    if id.is_empty() || id == "." || id == ".." {
        let mut fields = FieldErrors::new();
        fields.insert(
            "subscription_id".to_string(),
            vec!["Invalid subscription id".to_string()],
        );
        return Err(ApiError::InvalidInput(fields));
    }

    let mut url = Url::parse("http://localhost/")
        .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidResponse("cannot build cancel path".to_string()))?
        .clear()
        .extend(["api", "subscriptions", "subscriptions", id, "cancel"]);
    Ok(url.path().to_string())
}

/// Keys a single-record response may wrap the record under
const RECORD_ENVELOPE_KEYS: &[&str] = &["subscription", "data", "result"];

/// Portal API client.
/// Clone is cheap - the gateway is shared behind an Arc.
#[derive(Clone)]
pub struct PortalClient {
    gateway: Arc<Gateway>,
}

impl PortalClient {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    /// Build a client talking to the configured backend over HTTPS
    pub fn from_config(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        let gateway = Gateway::new(
            Arc::new(transport),
            SessionManager::new(store),
            &config.api_base_url,
        )
        .with_refresh_path(&config.refresh_path);
        Ok(Self::new(gateway))
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn session(&self) -> &SessionManager {
        self.gateway.session()
    }

    // ===== Authentication =====

    /// Authenticate and establish the session
    pub async fn login(&self, username: &str, password: &str) -> Result<UserIdentity, ApiError> {
        let body = serde_json::to_value(LoginRequest { username, password })
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let response = self
            .gateway
            .request_public(Method::POST, LOGIN_PATH, Some(&body))
            .await?;

        let value = response.value()?;
        self.session().login(&value)?;
        info!(username, "Login successful");
        Ok(self.session().user())
    }

    /// Create an account. Returns the created-resource payload.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let response = self
            .gateway
            .request_public(Method::POST, REGISTER_PATH, Some(&body))
            .await?;
        info!(username = %request.username, "Registration accepted");
        response.value()
    }

    /// Tell the backend to revoke the refresh token, then clear local tokens
    /// regardless of the outcome.
    pub async fn logout(&self) {
        let refresh = self.session().refresh_token();
        if self.session().access_token().is_some() {
            let body = LogoutRequest {
                refresh_token: refresh.as_deref(),
            };
            let result = match serde_json::to_value(body) {
                Ok(body) => self
                    .gateway
                    .request_once(Method::POST, LOGOUT_PATH, Some(&body))
                    .await
                    .map(|_| ()),
                Err(e) => Err(ApiError::InvalidResponse(e.to_string())),
            };
            if let Err(e) = result {
                warn!(error = %e, "Logout request failed, clearing local session anyway");
            }
        }
        self.session().logout();
    }

    // ===== Account =====

    pub async fn client_info(&self) -> Result<ClientInfo, ApiError> {
        self.gateway.get(CLIENT_ME_PATH).await
    }

    // ===== Funds =====

    pub async fn funds(&self) -> Result<Vec<Fund>, ApiError> {
        let value: Value = self.gateway.get(FUNDS_PATH).await?;
        let records = extract_list(value)
            .ok_or_else(|| ApiError::InvalidResponse("funds list is not an array".to_string()))?;
        let funds = Fund::from_records(records);
        debug!(count = funds.len(), "Funds loaded");
        Ok(funds)
    }

    // ===== Subscriptions =====

    pub async fn subscribe(
        &self,
        fund_id: &str,
        notification_preference: NotificationPreference,
    ) -> Result<Subscription, ApiError> {
        let request = SubscriptionRequest {
            fund_id: fund_id.to_string(),
            notification_preference,
        };
        let value: Value = self.gateway.post(SUBSCRIBE_PATH, &request).await?;
        let subscription: Subscription = parse_record(value)?;
        info!(fund_id, subscription_id = %subscription.id, "Subscription created");
        Ok(subscription)
    }

    /// Cancel a subscription. Returns the backend's reply as-is.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<Value, ApiError> {
        let value: Value = self
            .gateway
            .post(&cancel_path(subscription_id)?, &json!({}))
            .await?;
        info!(subscription_id, "Subscription canceled");
        Ok(value)
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>, ApiError> {
        let value: Value = self.gateway.get(SUBSCRIPTIONS_PATH).await?;
        let records = extract_list(value).ok_or_else(|| {
            ApiError::InvalidResponse("subscriptions list is not an array".to_string())
        })?;
        records
            .into_iter()
            .map(|record| {
                serde_json::from_value(record)
                    .map_err(|e| ApiError::InvalidResponse(format!("bad subscription record: {}", e)))
            })
            .collect()
    }
}

/// Parse a record that may be returned bare or under an envelope key
fn parse_record<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(record) => Ok(record),
        Err(e) => RECORD_ENVELOPE_KEYS
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(|inner| serde_json::from_value::<T>(inner.clone()).ok())
            .ok_or_else(|| ApiError::InvalidResponse(format!("unexpected record shape: {}", e))),
    }
}
