//! Subcommand handlers. Each one maps to a portal screen or action.

use anyhow::{bail, Result};
use fundportal_core::auth::TokenClaims;
use fundportal_core::config::Config;
use fundportal_core::models::{ClientInfo, NotificationPreference, RegistrationForm, Subscription};
use fundportal_core::utils::{format_currency, format_date, format_optional, truncate_string};
use fundportal_core::{PortalClient, SessionState};
use serde::Serialize;
use tracing::warn;

use crate::prompt;

/// Maximum width of name columns in tables
const NAME_COLUMN_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Protected commands need at least one token to work with; an expired
/// access token is fine as long as a refresh token can renew it.
fn require_session(portal: &PortalClient) -> Result<()> {
    let session = portal.session();
    if session.access_token().is_none() && session.refresh_token().is_none() {
        bail!("Not logged in. Run `fundportal login` first.");
    }
    Ok(())
}

// ===== Authentication =====

pub async fn login(portal: &PortalClient, config: &Config, username: Option<String>) -> Result<()> {
    let username = match (username, config.last_username.clone()) {
        (Some(username), _) => username,
        (None, Some(last)) => prompt::line_with_default("Username", &last)?,
        (None, None) => prompt::line("Username")?,
    };
    let password = prompt::password("Password")?;

    if username.is_empty() || password.is_empty() {
        bail!("Username and password required");
    }

    println!("Authenticating...");
    let identity = portal.login(&username, &password).await?;

    if let Err(e) = Config::remember_username(&username) {
        warn!(error = %e, "Failed to save config");
    }

    println!("Login successful. Welcome, {}!", identity.display_name());
    Ok(())
}

pub async fn register(portal: &PortalClient, accept_terms: bool) -> Result<()> {
    println!("Create a new account\n");
    let form = RegistrationForm {
        full_name: prompt::line("Full name")?,
        nit: prompt::line("NIT")?,
        email: prompt::line("Email")?,
        phone: prompt::line("Phone")?,
        username: prompt::line("Username")?,
        password: prompt::password("Password")?,
        confirm_password: prompt::password("Confirm password")?,
        accept_terms,
    };

    let request = form.into_request()?;
    portal.register(&request).await?;

    println!("\nRegistration successful! Log in with `fundportal login`.");
    Ok(())
}

pub async fn logout(portal: &PortalClient) -> Result<()> {
    let session = portal.session();
    if session.access_token().is_none() && session.refresh_token().is_none() {
        println!("No active session.");
        return Ok(());
    }
    portal.logout().await;
    println!("Logged out.");
    Ok(())
}

pub fn status(portal: &PortalClient, config: &Config) -> Result<()> {
    let session = portal.session();
    let state = session.state();

    println!("Backend:  {}", config.api_base_url);
    println!("Session:  {}", state);

    if state == SessionState::Authenticated {
        println!("User:     {}", session.user().display_name());
    } else if session.refresh_token().is_some() {
        println!("          (access token expired; it will be renewed on the next request)");
    }

    if let Some(expires_at) = session
        .access_token()
        .and_then(|token| TokenClaims::decode(&token))
        .and_then(|claims| claims.expires_at())
    {
        println!("Expires:  {}", expires_at.format("%b %d, %Y %H:%M UTC"));
    }
    Ok(())
}

// ===== Account =====

fn print_account(client: &ClientInfo) {
    println!("Name:     {}", format_optional(&client.full_name, "-"));
    println!("Email:    {}", format_optional(&client.email, "-"));
    println!("Phone:    {}", format_optional(&client.phone, "-"));
    println!("NIT:      {}", format_optional(&client.nit, "-"));
    println!("Balance:  {}", client.balance_display());
    if let Some(ref updated) = client.updated_at {
        println!("Updated:  {}", format_date(updated));
    }
}

pub async fn account(portal: &PortalClient, output: Output) -> Result<()> {
    require_session(portal)?;
    let client = portal.client_info().await?;
    if output.json {
        return output.print_json(&client);
    }
    print_account(&client);
    Ok(())
}

// ===== Funds =====

pub async fn funds(portal: &PortalClient, output: Output) -> Result<()> {
    require_session(portal)?;
    let funds = portal.funds().await?;
    if output.json {
        return output.print_json(&funds);
    }
    if funds.is_empty() {
        println!("No funds available for subscription.");
        return Ok(());
    }

    println!(
        "{:<10} {:<width$} {:>16} {:<8}",
        "ID",
        "FUND",
        "MIN AMOUNT",
        "CATEGORY",
        width = NAME_COLUMN_WIDTH
    );
    for fund in &funds {
        let min_amount = fund
            .min_amount
            .map(|amount| format_currency(amount, fund.currency.as_deref().unwrap_or("")))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<width$} {:>16} {:<8}",
            truncate_string(&fund.id, 10),
            truncate_string(fund.display_name(), NAME_COLUMN_WIDTH),
            min_amount,
            format_optional(&fund.category, "-"),
            width = NAME_COLUMN_WIDTH
        );
    }
    Ok(())
}

// ===== Subscriptions =====

fn print_subscriptions(subscriptions: &[&Subscription]) {
    println!(
        "{:<8} {:<width$} {:>14} {:<13} {:<6} {:<20} {:<20}",
        "ID",
        "FUND",
        "AMOUNT",
        "TYPE",
        "NOTIFY",
        "CREATED",
        "STATUS",
        width = NAME_COLUMN_WIDTH
    );
    for sub in subscriptions {
        let amount = sub
            .amount
            .map(|amount| format_currency(amount, sub.currency.as_deref().unwrap_or("")))
            .unwrap_or_else(|| "-".to_string());
        let notify = sub
            .notification_preference
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let created = sub
            .created_at
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string());
        let status = match sub.canceled_at {
            Some(ref canceled) => format!("Canceled {}", format_date(canceled)),
            None => "Active".to_string(),
        };
        println!(
            "{:<8} {:<width$} {:>14} {:<13} {:<6} {:<20} {:<20}",
            truncate_string(&sub.id, 8),
            truncate_string(sub.display_name(), NAME_COLUMN_WIDTH),
            amount,
            sub.transaction_type.label(),
            notify,
            created,
            status,
            width = NAME_COLUMN_WIDTH
        );
    }
}

pub async fn subscribe(
    portal: &PortalClient,
    fund_id: &str,
    notify: NotificationPreference,
    output: Output,
) -> Result<()> {
    require_session(portal)?;
    let subscription = portal.subscribe(fund_id, notify).await?;
    if output.json {
        return output.print_json(&subscription);
    }
    println!(
        "Subscribed to {} (subscription {}). Notifications by {}.",
        subscription.display_name(),
        subscription.id,
        notify
    );
    Ok(())
}

/// Only live subscriptions offer a cancel action. Ids missing from the
/// history are left for the backend to judge.
fn ensure_cancelable(subscriptions: &[Subscription], subscription_id: &str) -> Result<()> {
    match subscriptions.iter().find(|s| s.id == subscription_id) {
        Some(existing) if !existing.can_cancel() => {
            bail!("Subscription {} is already canceled", subscription_id)
        }
        _ => Ok(()),
    }
}

pub async fn cancel(portal: &PortalClient, subscription_id: &str, output: Output) -> Result<()> {
    require_session(portal)?;

    let subscriptions = portal.subscriptions().await?;
    ensure_cancelable(&subscriptions, subscription_id)?;

    let reply = portal.cancel_subscription(subscription_id).await?;
    if output.json {
        return output.print_json(&reply);
    }
    println!("Subscription {} canceled.", subscription_id);
    Ok(())
}

pub async fn subscriptions(portal: &PortalClient, active_only: bool, output: Output) -> Result<()> {
    require_session(portal)?;
    let subscriptions = portal.subscriptions().await?;
    let shown: Vec<&Subscription> = subscriptions
        .iter()
        .filter(|s| !active_only || s.can_cancel())
        .collect();

    if output.json {
        return output.print_json(&shown);
    }
    if shown.is_empty() {
        println!("No subscriptions yet.");
        return Ok(());
    }
    print_subscriptions(&shown);
    Ok(())
}

pub async fn dashboard(portal: &PortalClient, output: Output) -> Result<()> {
    require_session(portal)?;
    let (client, subscriptions) =
        futures::try_join!(portal.client_info(), portal.subscriptions())?;

    if output.json {
        return output.print_json(&serde_json::json!({
            "client": client,
            "subscriptions": subscriptions,
        }));
    }

    print_account(&client);
    println!();

    let active: Vec<&Subscription> = subscriptions.iter().filter(|s| s.can_cancel()).collect();
    if active.is_empty() {
        println!("No active subscriptions.");
    } else {
        println!("Active subscriptions ({}):", active.len());
        print_subscriptions(&active);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fundportal_core::api::{ApiError, HttpRequest, HttpResponse, Transport};
    use fundportal_core::auth::MemoryTokenStore;
    use fundportal_core::{Gateway, SessionManager};
    use std::sync::{Arc, Mutex};

    const OUTPUT: Output = Output { json: true };

    /// Serves a fixed subscription history and records every request
    #[derive(Default)]
    struct History {
        records: String,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for History {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.requests.lock().unwrap().push(request.url.clone());
            if request.url.ends_with("/subscriptions-list") {
                Ok(HttpResponse::new(200, self.records.clone()))
            } else {
                Ok(HttpResponse::new(200, r#"{"status": "canceled"}"#))
            }
        }
    }

    fn portal(records: &str, logged_in: bool) -> (PortalClient, Arc<History>) {
        let backend = Arc::new(History {
            records: records.to_string(),
            ..Default::default()
        });
        let session = SessionManager::new(Arc::new(MemoryTokenStore::new()));
        if logged_in {
            session.set_access_token("acc");
        }
        let gateway = Gateway::new(backend.clone(), session, "https://portal.test");
        (PortalClient::new(gateway), backend)
    }

    fn history() -> &'static str {
        r#"[
            {"id": "S1", "fund_id": "F1", "transaction_type": "SUBSCRIPTION", "canceled_at": "2024-03-06T09:00:00Z"},
            {"id": "S2", "fund_id": "F2", "transaction_type": "SUBSCRIPTION", "canceled_at": null}
        ]"#
    }

    #[test]
    fn test_ensure_cancelable() {
        let subscriptions: Vec<Subscription> = serde_json::from_str(history()).unwrap();
        assert!(ensure_cancelable(&subscriptions, "S1").is_err());
        assert!(ensure_cancelable(&subscriptions, "S2").is_ok());
        assert!(ensure_cancelable(&subscriptions, "S9").is_ok());
    }

    #[tokio::test]
    async fn test_cancel_of_canceled_subscription_skips_backend() {
        let (portal, backend) = portal(history(), true);

        let err = cancel(&portal, "S1", OUTPUT).await.unwrap_err();
        assert!(err.to_string().contains("already canceled"));

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].ends_with("/subscriptions-list"));
    }

    #[tokio::test]
    async fn test_cancel_of_active_subscription() {
        let (portal, backend) = portal(history(), true);

        cancel(&portal, "S2", OUTPUT).await.unwrap();

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].ends_with("/api/subscriptions/subscriptions/S2/cancel"));
    }

    #[tokio::test]
    async fn test_protected_commands_need_a_session() {
        let (portal, backend) = portal(history(), false);

        assert!(require_session(&portal).is_err());
        let err = funds(&portal, OUTPUT).await.unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
        assert!(cancel(&portal, "S2", OUTPUT).await.is_err());
        assert!(backend.requests.lock().unwrap().is_empty());

        portal.session().set_refresh_token("ref");
        assert!(require_session(&portal).is_ok());
    }
}
