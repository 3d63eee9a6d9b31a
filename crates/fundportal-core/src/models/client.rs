use serde::{Deserialize, Serialize};

use super::Fund;
use crate::utils::de::{opt_lenient_f64, opt_string_or_number};
use crate::utils::format_currency;

/// Account snapshot returned by `/api/clients/me`.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub nit: Option<String>,
    /// Available balance
    #[serde(default, deserialize_with = "opt_lenient_f64")]
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub updated_at: Option<String>,
}

impl ClientInfo {
    pub fn balance(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }

    pub fn balance_display(&self) -> String {
        format_currency(self.balance(), self.currency.as_deref().unwrap_or(""))
    }

    /// Whether the balance covers the fund's minimum amount.
    /// Funds without a minimum are always affordable.
    pub fn can_afford(&self, fund: &Fund) -> bool {
        fund.min_amount.map(|min| self.balance() >= min).unwrap_or(true)
    }
}
