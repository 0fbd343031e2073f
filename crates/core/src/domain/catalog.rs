//! Records returned by the product, pricing and store services.
//!
//! Upstream payloads are loosely shaped, so every field except the identifier is optional and
//! unknown fields are kept in `attributes` rather than rejected.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Echoed on every upstream response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    #[serde(rename = "customerId", default)]
    pub customer_id: String,
    #[serde(rename = "branchCode", default)]
    pub branch_code: String,
    #[serde(rename = "shipToSequenceNumber", default, deserialize_with = "string_or_number")]
    pub ship_to_sequence_number: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    #[serde(alias = "sku", alias = "partNumber", alias = "item_code", deserialize_with = "string_or_number")]
    pub part_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSearchResult {
    #[serde(default, alias = "results", alias = "items")]
    pub products: Vec<ProductSummary>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub page: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(alias = "sku", alias = "partNumber", alias = "item_code", deserialize_with = "string_or_number")]
    pub part_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    #[serde(alias = "itemCode", alias = "part_number")]
    pub item_code: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default, alias = "unit_price", alias = "current_price")]
    pub price: Option<Decimal>,
    #[serde(default, alias = "inStock", alias = "available")]
    pub in_stock: bool,
    #[serde(default, alias = "quantity_available", alias = "availableQuantity")]
    pub available_quantity: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBatch {
    #[serde(default, alias = "items", alias = "pricing")]
    pub prices: Vec<PriceQuote>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(alias = "id", alias = "branch_id", alias = "storeId", deserialize_with = "string_or_number")]
    pub store_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, alias = "zip_code", alias = "postal_code")]
    pub zip: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "distance")]
    pub distance_miles: Option<f64>,
    #[serde(default)]
    pub hours: BTreeMap<String, String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSearchResult {
    #[serde(default, alias = "results", alias = "items")]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub page: u32,
}

pub const WEEKDAYS: [&str; 7] =
    ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];

impl Store {
    /// Opening hours Monday through Sunday. Days without an entry read `Closed`.
    pub fn weekly_hours(&self) -> Vec<(&'static str, String)> {
        WEEKDAYS
            .iter()
            .map(|day| {
                let hours = self
                    .hours
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(day))
                    .map(|(_, value)| value.clone())
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "Closed".to_string());
                (*day, hours)
            })
            .collect()
    }

    pub fn address_line(&self) -> Option<String> {
        let parts = [&self.address, &self.city, &self.state, &self.zip]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

fn default_unit() -> String {
    crate::domain::intent::DEFAULT_UNIT.to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{PriceBatch, Store, StoreSearchResult};

    #[test]
    fn store_ids_accept_numbers_and_hours_fill_missing_days() {
        let parsed: StoreSearchResult = serde_json::from_value(serde_json::json!({
            "stores": [{
                "id": 123,
                "name": "Miami Branch",
                "city": "Miami",
                "state": "FL",
                "distance": 2.4,
                "hours": {"Monday": "7:00-17:00", "Saturday": "8:00-12:00"}
            }],
            "total_results": 1,
            "page": 1
        }))
        .expect("store payload should parse");

        let store: &Store = &parsed.stores[0];
        assert_eq!(store.store_id, "123");
        assert_eq!(store.distance_miles, Some(2.4));

        let hours = store.weekly_hours();
        assert_eq!(hours.len(), 7);
        assert_eq!(hours[0], ("monday", "7:00-17:00".to_string()));
        assert_eq!(hours[6], ("sunday", "Closed".to_string()));
        assert_eq!(store.address_line().as_deref(), Some("Miami, FL"));
    }

    #[test]
    fn price_batch_reads_aliases_and_defaults_unit() {
        let parsed: PriceBatch = serde_json::from_value(serde_json::json!({
            "items": [{"item_code": "LZA406103A", "price": "599.99", "in_stock": true}],
            "customerId": "HPTA"
        }))
        .expect("pricing payload should parse");

        assert_eq!(parsed.prices.len(), 1);
        assert_eq!(parsed.prices[0].unit, "EA");
        assert_eq!(parsed.prices[0].price, Some(Decimal::new(59_999, 2)));
        assert!(parsed.prices[0].in_stock);
    }
}
