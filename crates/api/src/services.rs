//! REST adapters behind the specialist collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use poolchat_agent::specialists::{PricingService, ProductCatalog, StoreDirectory};
use poolchat_core::domain::catalog::{
    PriceBatch, PriceQuote, ProductRecord, ProductSearchResult, Store, StoreMetadata,
    StoreSearchResult,
};
use poolchat_core::domain::intent::{Coordinates, PricingItem};
use poolchat_core::errors::SpecialistError;
use serde::{Deserialize, Serialize};

use crate::client::RestClient;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProductEnvelope {
    Wrapped { product: ProductRecord },
    Bare(ProductRecord),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreEnvelope {
    Wrapped { store: Store },
    Bare(Store),
}

#[derive(Debug, Serialize)]
struct PricingRequest<'a> {
    items: &'a [PricingItem],
}

/// Identifiers are placed in the URL path, so only plain codes are accepted.
fn path_segment(kind: &str, raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 40
        && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(ApiError::InvalidInput(format!("{kind} `{raw}` is not a valid identifier")))
    }
}

pub struct HttpProductCatalog {
    client: Arc<RestClient>,
}

impl HttpProductCatalog {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    async fn search(
        &self,
        term: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ProductSearchResult, SpecialistError> {
        tracing::info!(event_name = "upstream.products.search", term, page, "searching products");
        let query = [
            ("term", term.to_string()),
            ("page_size", page_size.to_string()),
            ("page", page.to_string()),
        ];
        Ok(self.client.get_json("/api/search", &query).await?)
    }

    async fn semantic_search(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<ProductSearchResult, SpecialistError> {
        tracing::info!(
            event_name = "upstream.products.semantic_search",
            query,
            "searching products"
        );
        let params = [("query", query.to_string()), ("limit", limit.to_string())];
        Ok(self.client.get_json("/api/products/search", &params).await?)
    }

    async fn detail(&self, part_number: &str) -> Result<ProductRecord, SpecialistError> {
        let part_number = path_segment("part number", part_number)?;
        tracing::info!(
            event_name = "upstream.products.detail",
            part_number = %part_number,
            "fetching product"
        );
        let envelope: ProductEnvelope =
            self.client.get_json(&format!("/api/products/{part_number}"), &[]).await?;
        Ok(match envelope {
            ProductEnvelope::Wrapped { product } | ProductEnvelope::Bare(product) => product,
        })
    }
}

pub struct HttpPricingService {
    client: Arc<RestClient>,
}

impl HttpPricingService {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PricingService for HttpPricingService {
    async fn price(&self, items: &[PricingItem]) -> Result<Vec<PriceQuote>, SpecialistError> {
        tracing::info!(event_name = "upstream.pricing.batch", items = items.len(), "pricing batch");
        let batch: PriceBatch =
            self.client.post_json("/api/pricing", &PricingRequest { items }).await?;
        Ok(batch.prices)
    }
}

pub struct HttpStoreDirectory {
    client: Arc<RestClient>,
}

impl HttpStoreDirectory {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StoreDirectory for HttpStoreDirectory {
    async fn search(
        &self,
        at: Coordinates,
        radius_miles: u32,
        page: u32,
        page_size: u32,
    ) -> Result<StoreSearchResult, SpecialistError> {
        tracing::info!(
            event_name = "upstream.stores.search",
            at = %at,
            radius_miles,
            "searching stores"
        );
        let query = [
            ("latitude", at.latitude.to_string()),
            ("longitude", at.longitude.to_string()),
            ("radius", radius_miles.to_string()),
            ("page_size", page_size.to_string()),
            ("page", page.to_string()),
        ];
        Ok(self.client.get_json("/api/stores/search", &query).await?)
    }

    async fn detail(&self, store_id: &str) -> Result<Store, SpecialistError> {
        let store_id = path_segment("store id", store_id)?;
        tracing::info!(
            event_name = "upstream.stores.detail",
            store_id = %store_id,
            "fetching store"
        );
        let envelope: StoreEnvelope =
            self.client.get_json(&format!("/api/stores/{store_id}"), &[]).await?;
        Ok(match envelope {
            StoreEnvelope::Wrapped { store } | StoreEnvelope::Bare(store) => store,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "store_metadata", alias = "storeMetadata")]
    pub metadata: Option<StoreMetadata>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "healthy" | "ok" | "up")
    }
}

/// `GET /health` on the upstream service.
pub async fn check_health(client: &RestClient) -> Result<HealthReport, ApiError> {
    client.get_json("/health", &[]).await
}

#[cfg(test)]
mod tests {
    use poolchat_core::domain::catalog::ProductRecord;

    use super::{path_segment, HealthReport, ProductEnvelope};

    #[test]
    fn path_identifiers_reject_traversal() {
        assert_eq!(path_segment("part number", " LZA406103A ").expect("valid"), "LZA406103A");
        assert!(path_segment("part number", "../admin").is_err());
        assert!(path_segment("store id", "").is_err());
    }

    #[test]
    fn product_detail_accepts_wrapped_and_bare_shapes() {
        let wrapped: ProductEnvelope = serde_json::from_value(serde_json::json!({
            "product": {"part_number": "LZA406103A", "name": "Cartridge"},
            "customerId": "HPTA"
        }))
        .expect("wrapped parses");
        let bare: ProductEnvelope =
            serde_json::from_value(serde_json::json!({"sku": "LZA406103A", "name": "Cartridge"}))
                .expect("bare parses");

        for envelope in [wrapped, bare] {
            let record: ProductRecord = match envelope {
                ProductEnvelope::Wrapped { product } | ProductEnvelope::Bare(product) => product,
            };
            assert_eq!(record.part_number, "LZA406103A");
        }
    }

    #[test]
    fn health_report_reads_status() {
        let report: HealthReport =
            serde_json::from_value(serde_json::json!({"status": "healthy"})).expect("parses");
        assert!(report.is_healthy());
        assert!(!HealthReport::default().is_healthy());
    }
}
