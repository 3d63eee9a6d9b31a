use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::de::{opt_lenient_f64, opt_string_or_number, string_or_number};

/// How the backend notifies the client about a subscription.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationPreference {
    #[default]
    Email,
    Sms,
}

impl NotificationPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPreference::Email => "EMAIL",
            NotificationPreference::Sms => "SMS",
        }
    }
}

impl fmt::Display for NotificationPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMAIL" => Ok(NotificationPreference::Email),
            "SMS" => Ok(NotificationPreference::Sms),
            other => Err(format!("unknown notification preference: {}", other)),
        }
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Subscription,
    Cancellation,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TransactionType {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Subscription => "Subscription",
            TransactionType::Cancellation => "Cancellation",
            TransactionType::Unknown => "Unknown",
        }
    }
}

/// Body of `POST /api/subscriptions/subscriptions-new`
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    pub fund_id: String,
    pub notification_preference: NotificationPreference,
}

/// A subscription history record.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub fund_id: Option<String>,
    pub fund_name: Option<String>,
    #[serde(default, deserialize_with = "opt_lenient_f64")]
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub transaction_type: TransactionType,
    pub notification_preference: Option<NotificationPreference>,
    pub created_at: Option<String>,
    pub canceled_at: Option<String>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.canceled_at.is_none()
    }

    /// Cancel is offered only for live subscription records
    pub fn can_cancel(&self) -> bool {
        self.is_active() && self.transaction_type != TransactionType::Cancellation
    }

    pub fn display_name(&self) -> &str {
        self.fund_name
            .as_deref()
            .or(self.fund_id.as_deref())
            .unwrap_or(&self.id)
    }
}
