use std::sync::Arc;

use async_trait::async_trait;
use poolchat_core::domain::fragment::FragmentPayload;
use poolchat_core::domain::intent::{Intent, IntentKind};
use poolchat_core::errors::SpecialistError;

use crate::specialists::{ProductCatalog, Specialist};

const SEARCH_PAGE_SIZE: u32 = 5;
const SEMANTIC_LIMIT: u32 = 3;
const SEMANTIC_MIN_WORDS: usize = 4;
const SEMANTIC_TRIGGERS: &[&str] =
    &["recommend", "best", "difference", "versus", "vs", "compatible", "alternative"];

pub const MISSING_SEARCH_TERM: &str =
    "What kind of pool equipment are you looking for? A product type, brand or part number helps.";
pub const MISSING_PART_NUMBER: &str =
    "Which product do you mean? Please send me its part number, for example LZA406103A.";

pub struct ProductSpecialist {
    catalog: Arc<dyn ProductCatalog>,
}

impl ProductSpecialist {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }

    async fn search(&self, term: &str, page: u32) -> Result<FragmentPayload, SpecialistError> {
        let result = if prefers_semantic_search(term) {
            self.catalog.semantic_search(term, SEMANTIC_LIMIT).await?
        } else {
            self.catalog.search(term, page, SEARCH_PAGE_SIZE).await?
        };
        Ok(FragmentPayload::ProductList(result))
    }

    async fn detail(&self, part_number: &str) -> Result<FragmentPayload, SpecialistError> {
        match self.catalog.detail(part_number).await {
            Ok(record) => Ok(FragmentPayload::ProductDetail(record)),
            Err(SpecialistError::NotFound(reason)) => {
                tracing::debug!(
                    event_name = "specialist.product.detail_fallback",
                    part_number,
                    reason = %reason,
                    "detail lookup missed; falling back to search"
                );
                let result = self.catalog.search(part_number, 1, SEARCH_PAGE_SIZE).await?;
                if result.products.is_empty() {
                    return Err(SpecialistError::NotFound(part_number.to_string()));
                }
                Ok(FragmentPayload::ProductList(result))
            }
            Err(other) => Err(other),
        }
    }
}

/// Descriptive phrasing goes to the vector-enhanced backend, plain terms to lexical search.
pub fn prefers_semantic_search(term: &str) -> bool {
    let words = term.split_whitespace().map(str::to_ascii_lowercase).collect::<Vec<_>>();
    words.len() >= SEMANTIC_MIN_WORDS
        || words.iter().any(|word| SEMANTIC_TRIGGERS.contains(&word.as_str()))
}

#[async_trait]
impl Specialist for ProductSpecialist {
    fn name(&self) -> &'static str {
        "product"
    }

    fn handles(&self) -> &'static [IntentKind] {
        &[IntentKind::ProductSearch, IntentKind::ProductDetail]
    }

    async fn handle(&self, intent: &Intent) -> Result<FragmentPayload, SpecialistError> {
        let slots = &intent.slots;
        match intent.kind {
            IntentKind::ProductDetail => match slots.part_number.as_deref() {
                Some(part_number) => self.detail(part_number).await,
                None => Ok(FragmentPayload::Clarification(MISSING_PART_NUMBER.to_string())),
            },
            IntentKind::ProductSearch => match slots.search_term.as_deref() {
                Some(term) => self.search(term, slots.page.unwrap_or(1)).await,
                None => Ok(FragmentPayload::Clarification(MISSING_SEARCH_TERM.to_string())),
            },
            other => Err(SpecialistError::BadRequest(format!(
                "product specialist cannot handle {other}"
            ))),
        }
    }
}
