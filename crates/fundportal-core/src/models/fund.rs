use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::utils::de::{opt_lenient_f64, string_or_number};

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fund {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub fund_name: Option<String>,
    pub name: Option<String>,
    /// Minimum amount required to subscribe
    #[serde(default, deserialize_with = "opt_lenient_f64")]
    pub min_amount: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
}

impl Fund {
    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.fund_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }

    /// Parse the funds-list records, filling in an `id` of `fund-<index>`
    /// and a `name` of `Fund <index+1>` where the backend left them out.
    /// Records that still fail to parse are skipped.
    pub fn from_records(records: Vec<Value>) -> Vec<Fund> {
        records
            .into_iter()
            .enumerate()
            .filter_map(|(index, mut record)| {
                if let Value::Object(ref mut map) = record {
                    let missing_id = map.get("id").map(Value::is_null).unwrap_or(true);
                    if missing_id {
                        map.insert("id".to_string(), Value::String(format!("fund-{}", index)));
                    }
                    let missing_name = map.get("name").map(Value::is_null).unwrap_or(true);
                    if missing_name {
                        map.insert("name".to_string(), Value::String(format!("Fund {}", index + 1)));
                    }
                }
                match serde_json::from_value::<Fund>(record) {
                    Ok(fund) => Some(fund),
                    Err(e) => {
                        warn!(index, error = %e, "Skipping unparseable fund record");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_records_fills_defaults() {
        let funds = Fund::from_records(vec![
            json!({"id": 1, "fund_name": "FPV_BTG_PACTUAL_RECAUDADORA", "min_amount": 75000, "currency": "COP", "category": "FPV"}),
            json!({"fund_name": "DEUDAPRIVADA", "min_amount": "50000"}),
            json!({"id": null}),
        ]);
        assert_eq!(funds.len(), 3);

        assert_eq!(funds[0].id, "1");
        assert_eq!(funds[0].display_name(), "FPV_BTG_PACTUAL_RECAUDADORA");
        assert_eq!(funds[0].min_amount, Some(75000.0));
        assert_eq!(funds[0].name.as_deref(), Some("Fund 1"));

        assert_eq!(funds[1].id, "fund-1");
        assert_eq!(funds[1].min_amount, Some(50000.0));

        assert_eq!(funds[2].id, "fund-2");
        assert_eq!(funds[2].display_name(), "Fund 3");
    }

    #[test]
    fn test_from_records_skips_garbage() {
        let funds = Fund::from_records(vec![json!("just a string"), json!({"id": "F1"})]);
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].id, "F1");
    }
}
