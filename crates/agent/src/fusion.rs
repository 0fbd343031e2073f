//! Fusion orders and deduplicates fragments; formatters turn them into one outbound message.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use poolchat_core::domain::catalog::{PriceQuote, ProductRecord, ProductSearchResult, Store, StoreSearchResult};
use poolchat_core::domain::fragment::{Fragment, FragmentPayload, ALL_FAILED_APOLOGY};
use poolchat_core::domain::intent::IntentKind;
use poolchat_core::domain::query::Query;
use poolchat_core::errors::OrchestrationError;

use crate::llm::LlmClient;
use crate::prompts;

/// Orders fragments by intent priority, then plan position, and drops facts already shown.
///
/// When every plan fragment failed the result is a single apology fragment.
pub fn fuse(mut fragments: Vec<Fragment>) -> Vec<Fragment> {
    let attempted = fragments.iter().filter(|fragment| fragment.plan_index().is_some()).count();
    let succeeded = fragments
        .iter()
        .filter(|fragment| fragment.plan_index().is_some() && fragment.is_success())
        .count();
    if attempted > 0 && succeeded == 0 {
        let error = OrchestrationError::AllSpecialistsFailed { attempted };
        tracing::warn!(event_name = error.event_name(), attempted, "{error}");
        return vec![Fragment::apology(error.user_message().unwrap_or(ALL_FAILED_APOLOGY))];
    }

    fragments.sort_by_key(|fragment| {
        (fragment.intent.kind.fusion_rank(), fragment.plan_index().unwrap_or(usize::MAX))
    });

    let mut seen = Seen::default();
    fragments.into_iter().filter_map(|fragment| seen.admit(fragment)).collect()
}

#[derive(Default)]
struct Seen {
    products: HashSet<String>,
    prices: HashSet<(String, String)>,
    stores: HashSet<String>,
    texts: HashSet<String>,
}

impl Seen {
    fn admit(&mut self, mut fragment: Fragment) -> Option<Fragment> {
        match &mut fragment.payload {
            FragmentPayload::ProductDetail(record) => {
                if !self.products.insert(record.part_number.to_ascii_uppercase()) {
                    return None;
                }
            }
            FragmentPayload::ProductList(result) => {
                let before = result.products.len();
                result
                    .products
                    .retain(|product| self.products.insert(product.part_number.to_ascii_uppercase()));
                if before > 0 && result.products.is_empty() {
                    return None;
                }
            }
            FragmentPayload::Prices(quotes) => {
                quotes.retain(|quote| {
                    self.prices
                        .insert((quote.item_code.to_ascii_uppercase(), quote.unit.to_ascii_uppercase()))
                });
                if quotes.is_empty() {
                    return None;
                }
            }
            FragmentPayload::StoreDetail(store) => {
                if !self.stores.insert(store.store_id.clone()) {
                    return None;
                }
            }
            FragmentPayload::StoreList(result) => {
                let before = result.stores.len();
                result.stores.retain(|store| self.stores.insert(store.store_id.clone()));
                if before > 0 && result.stores.is_empty() {
                    return None;
                }
            }
            FragmentPayload::Advisory(text)
            | FragmentPayload::Clarification(text)
            | FragmentPayload::Refusal(text)
            | FragmentPayload::Apology(text) => {
                if !self.texts.insert(text.trim().to_string()) {
                    return None;
                }
            }
            FragmentPayload::Empty => {}
        }
        Some(fragment)
    }
}

#[async_trait]
pub trait ResponseFormatter: Send + Sync {
    async fn format(&self, query: &Query, fragments: &[Fragment]) -> String;
}

/// Deterministic rendering, one section per fragment.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextFormatter;

impl PlainTextFormatter {
    pub fn render(&self, fragments: &[Fragment]) -> String {
        fragments.iter().filter_map(render_fragment).collect::<Vec<_>>().join("\n\n")
    }
}

#[async_trait]
impl ResponseFormatter for PlainTextFormatter {
    async fn format(&self, _query: &Query, fragments: &[Fragment]) -> String {
        self.render(fragments)
    }
}

/// Asks the model to merge several answers into one reply. Falls back to plain text.
pub struct LlmSynthesisFormatter {
    llm: Arc<dyn LlmClient>,
    plain: PlainTextFormatter,
}

impl LlmSynthesisFormatter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, plain: PlainTextFormatter }
    }
}

#[async_trait]
impl ResponseFormatter for LlmSynthesisFormatter {
    async fn format(&self, query: &Query, fragments: &[Fragment]) -> String {
        let facts = self.plain.render(fragments);
        let data_fragments = fragments
            .iter()
            .filter(|fragment| fragment.is_success() && fragment.payload.is_cacheable())
            .count();
        if data_fragments < 2 {
            return facts;
        }

        match self.llm.complete(&prompts::synthesis(query.text(), &facts)).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => facts,
            Err(error) => {
                tracing::warn!(
                    event_name = "orchestration.fusion.synthesis_failed",
                    session_id = %query.session_id(),
                    error = %error,
                    "synthesis unavailable; sending plain rendering"
                );
                facts
            }
        }
    }
}

fn render_fragment(fragment: &Fragment) -> Option<String> {
    if let Some(kind) = fragment.failure() {
        tracing::debug!(
            event_name = "orchestration.fusion.failed_section",
            intent = %fragment.intent.kind,
            failure = kind.as_str(),
            "rendering apology for failed fragment"
        );
        return Some(format!("Sorry, I couldn't get {} right now.", subject(fragment.intent.kind)));
    }

    match &fragment.payload {
        FragmentPayload::ProductList(result) => {
            Some(render_products(result, fragment.intent.slots.search_term.as_deref()))
        }
        FragmentPayload::ProductDetail(record) => Some(render_product_detail(record)),
        FragmentPayload::Prices(quotes) => Some(render_prices(quotes)),
        FragmentPayload::StoreList(result) => Some(render_stores(result)),
        FragmentPayload::StoreDetail(store) => Some(render_store_detail(store)),
        FragmentPayload::Advisory(text)
        | FragmentPayload::Clarification(text)
        | FragmentPayload::Refusal(text)
        | FragmentPayload::Apology(text) => Some(text.trim().to_string()),
        FragmentPayload::Empty => None,
    }
}

fn subject(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::ProductSearch | IntentKind::ProductDetail => "product information",
        IntentKind::Pricing => "pricing",
        IntentKind::StoreSearch | IntentKind::StoreDetail => "store information",
        IntentKind::Advisory => "an answer to that question",
        IntentKind::Unknown => "that information",
    }
}

fn render_products(result: &ProductSearchResult, term: Option<&str>) -> String {
    if result.products.is_empty() {
        return match term {
            Some(term) => format!("I couldn't find any products matching \"{term}\"."),
            None => "I couldn't find any matching products.".to_string(),
        };
    }

    let mut lines = vec![match term {
        Some(term) => format!("Products matching \"{term}\":"),
        None => "Products:".to_string(),
    }];
    for product in &result.products {
        let mut line = format!("- {} ({})", display_name(&product.name, &product.part_number), product.part_number);
        if let Some(brand) = product.brand.as_deref().filter(|brand| !brand.is_empty()) {
            line.push_str(&format!(", {brand}"));
        }
        lines.push(line);
    }
    let shown = result.products.len() as u64;
    if result.total_results > shown {
        lines.push(format!("Showing {shown} of {} results.", result.total_results));
    }
    lines.join("\n")
}

fn render_product_detail(record: &ProductRecord) -> String {
    let mut lines = vec![format!(
        "{} ({})",
        display_name(&record.name, &record.part_number),
        record.part_number
    )];
    if let Some(brand) = record.brand.as_deref().filter(|value| !value.is_empty()) {
        lines.push(format!("Brand: {brand}"));
    }
    if let Some(category) = record.category.as_deref().filter(|value| !value.is_empty()) {
        lines.push(format!("Category: {category}"));
    }
    if let Some(description) = record.description.as_deref().filter(|value| !value.is_empty()) {
        lines.push(description.trim().to_string());
    }
    if !record.features.is_empty() {
        lines.push("Features:".to_string());
        lines.extend(record.features.iter().map(|feature| format!("- {feature}")));
    }
    lines.join("\n")
}

fn render_prices(quotes: &[PriceQuote]) -> String {
    let mut lines = vec!["Pricing:".to_string()];
    for quote in quotes {
        let price = match quote.price {
            Some(price) => format!("${}", price.round_dp(2)),
            None => "price unavailable".to_string(),
        };
        let stock = match (quote.in_stock, quote.available_quantity) {
            (true, Some(quantity)) => format!("in stock ({quantity} available)"),
            (true, None) => "in stock".to_string(),
            (false, _) => "out of stock".to_string(),
        };
        lines.push(format!("- {} ({}): {price}, {stock}", quote.item_code, quote.unit));
    }
    lines.join("\n")
}

fn render_stores(result: &StoreSearchResult) -> String {
    if result.stores.is_empty() {
        return "I couldn't find any stores in that area.".to_string();
    }
    let mut lines = vec!["Nearby stores:".to_string()];
    for store in &result.stores {
        let mut line = format!("- {} (#{})", display_name(&store.name, &store.store_id), store.store_id);
        if let Some(address) = store.address_line() {
            line.push_str(&format!(", {address}"));
        }
        if let Some(distance) = store.distance_miles {
            line.push_str(&format!(", {distance:.1} mi"));
        }
        if let Some(phone) = store.phone.as_deref().filter(|phone| !phone.is_empty()) {
            line.push_str(&format!(", {phone}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn render_store_detail(store: &Store) -> String {
    let mut lines = vec![format!("{} (#{})", display_name(&store.name, &store.store_id), store.store_id)];
    if let Some(address) = store.address_line() {
        lines.push(address);
    }
    if let Some(phone) = store.phone.as_deref().filter(|phone| !phone.is_empty()) {
        lines.push(format!("Phone: {phone}"));
    }
    lines.push("Hours:".to_string());
    for (day, hours) in store.weekly_hours() {
        lines.push(format!("- {}: {hours}", capitalize(day)));
    }
    lines.join("\n")
}

fn display_name<'a>(name: &'a str, fallback: &'a str) -> &'a str {
    if name.trim().is_empty() {
        fallback
    } else {
        name.trim()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
