//! End-to-end coordinator scenarios against in-memory collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use poolchat_agent::llm::{LlmClient, PromptContext};
use poolchat_agent::specialists::{
    Geocoder, PricingService, ProductCatalog, SpecialistRegistry, StoreDirectory,
};
use poolchat_agent::Coordinator;
use poolchat_core::config::AppConfig;
use poolchat_core::domain::catalog::{
    PriceQuote, ProductRecord, ProductSearchResult, Store, StoreSearchResult,
};
use poolchat_core::domain::fragment::{ALL_FAILED_APOLOGY, HELP_NOTICE, REFUSAL_TEXT};
use poolchat_core::domain::intent::{Coordinates, IntentKind, PricingItem, SlotName};
use poolchat_core::domain::query::{Query, SessionId};
use poolchat_core::domain::scope::ScopeSignal;
use poolchat_core::errors::SpecialistError;
use rust_decimal::Decimal;

#[derive(Default)]
struct Calls {
    catalog: AtomicUsize,
    pricing: AtomicUsize,
    stores: AtomicUsize,
    geocoder: AtomicUsize,
    llm: AtomicUsize,
}

impl Calls {
    fn total(&self) -> usize {
        [&self.catalog, &self.pricing, &self.stores, &self.geocoder, &self.llm]
            .iter()
            .map(|counter| counter.load(Ordering::SeqCst))
            .sum()
    }
}

struct FakeCatalog(Arc<Calls>);

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn search(
        &self,
        _term: &str,
        page: u32,
        _page_size: u32,
    ) -> Result<ProductSearchResult, SpecialistError> {
        self.0.catalog.fetch_add(1, Ordering::SeqCst);
        Ok(ProductSearchResult { products: Vec::new(), total_results: 0, page })
    }

    async fn semantic_search(
        &self,
        _query: &str,
        _limit: u32,
    ) -> Result<ProductSearchResult, SpecialistError> {
        self.0.catalog.fetch_add(1, Ordering::SeqCst);
        Ok(ProductSearchResult::default())
    }

    async fn detail(&self, part_number: &str) -> Result<ProductRecord, SpecialistError> {
        self.0.catalog.fetch_add(1, Ordering::SeqCst);
        if part_number != "LZA406103A" {
            return Err(SpecialistError::NotFound(part_number.to_owned()));
        }
        Ok(ProductRecord {
            part_number: "LZA406103A".to_owned(),
            name: "Pro-Grid Cartridge Element".to_owned(),
            brand: Some("Hayward".to_owned()),
            ..ProductRecord::default()
        })
    }
}

struct FakePricing {
    calls: Arc<Calls>,
    down: bool,
}

#[async_trait]
impl PricingService for FakePricing {
    async fn price(&self, items: &[PricingItem]) -> Result<Vec<PriceQuote>, SpecialistError> {
        self.calls.pricing.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(SpecialistError::Unavailable("status 500: pricing backend".to_owned()));
        }
        Ok(items
            .iter()
            .map(|item| PriceQuote {
                item_code: item.item_code.clone(),
                unit: item.unit.clone(),
                price: Some(Decimal::new(59_999, 2)),
                in_stock: true,
                available_quantity: None,
            })
            .collect())
    }
}

struct FakeStores(Arc<Calls>);

#[async_trait]
impl StoreDirectory for FakeStores {
    async fn search(
        &self,
        _at: Coordinates,
        _radius_miles: u32,
        page: u32,
        _page_size: u32,
    ) -> Result<StoreSearchResult, SpecialistError> {
        self.0.stores.fetch_add(1, Ordering::SeqCst);
        Ok(StoreSearchResult {
            stores: vec![Store {
                store_id: "123".to_owned(),
                name: "Miami Branch".to_owned(),
                city: Some("Miami".to_owned()),
                state: Some("FL".to_owned()),
                distance_miles: Some(2.4),
                ..Store::default()
            }],
            total_results: 1,
            page,
        })
    }

    async fn detail(&self, store_id: &str) -> Result<Store, SpecialistError> {
        self.0.stores.fetch_add(1, Ordering::SeqCst);
        Err(SpecialistError::NotFound(store_id.to_owned()))
    }
}

struct FakeGeocoder(Arc<Calls>);

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, SpecialistError> {
        self.0.geocoder.fetch_add(1, Ordering::SeqCst);
        Ok(if location.eq_ignore_ascii_case("miami") {
            Coordinates::new(25.7617, -80.1918)
        } else {
            None
        })
    }
}

/// Answers advisory prompts and refuses everything else, like a model without a schema.
struct ScriptedLlm(Arc<Calls>);

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &PromptContext) -> Result<String> {
        self.0.llm.fetch_add(1, Ordering::SeqCst);
        let system = prompt.messages.first().map(|message| message.content.as_str()).unwrap_or("");
        if system.contains("expert in pool equipment and maintenance") {
            return Ok("Drain the lines and add pool antifreeze before the first frost.".to_owned());
        }
        bail!("no scripted answer")
    }
}

struct Harness {
    calls: Arc<Calls>,
    coordinator: Coordinator,
}

fn harness(pricing_down: bool) -> Harness {
    let calls = Arc::new(Calls::default());
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm(Arc::clone(&calls)));
    let registry = SpecialistRegistry::standard(
        Arc::new(FakeCatalog(Arc::clone(&calls))),
        Arc::new(FakePricing { calls: Arc::clone(&calls), down: pricing_down }),
        Arc::new(FakeStores(Arc::clone(&calls))),
        Arc::new(FakeGeocoder(Arc::clone(&calls))),
        Arc::clone(&llm),
    );
    let mut settings = AppConfig::default().orchestration;
    settings.llm_synthesis = false;
    let coordinator = Coordinator::new(&settings, llm, registry).expect("patterns compile");
    Harness { calls, coordinator }
}

fn ask(session: &str, text: &str) -> Query {
    Query::new(SessionId::new(session), text)
}

#[tokio::test]
async fn price_question_makes_one_pricing_call() {
    let harness = harness(false);

    let reply = harness.coordinator.handle(ask("chat-1", "price of LZA406103A")).await;

    assert_eq!(reply.verdict.signal, ScopeSignal::ProductCode("LZA406103A".to_owned()));
    assert_eq!(reply.plan.kinds(), vec![IntentKind::Pricing]);
    let items = &reply.plan.entries()[0].slots.items;
    assert_eq!(items, &vec![PricingItem::new("LZA406103A", Some("EA"))]);
    assert!(reply.text.contains("599.99"), "reply was: {}", reply.text);
    assert!(reply.text.contains("in stock"));
    assert_eq!(harness.calls.pricing.load(Ordering::SeqCst), 1);
    assert_eq!(harness.calls.total(), 1);
}

#[tokio::test]
async fn off_topic_question_is_refused_without_any_calls() {
    let harness = harness(false);

    let reply = harness.coordinator.handle(ask("chat-2", "what's the weather today")).await;

    assert_eq!(reply.text, REFUSAL_TEXT);
    assert!(reply.plan.is_empty());
    assert_eq!(harness.calls.total(), 0);
    assert!(harness.coordinator.cache().is_empty());
}

#[tokio::test]
async fn unrelated_request_without_pool_words_gets_help_without_calls() {
    let harness = harness(false);

    let reply = harness.coordinator.handle(ask("chat-2b", "find me a good restaurant")).await;

    assert_eq!(reply.text, HELP_NOTICE);
    assert!(reply.plan.is_unknown());
    assert_eq!(harness.calls.total(), 0);
    assert!(harness.coordinator.cache().is_empty());
}

#[tokio::test]
async fn pricing_outage_still_answers_the_store_part() {
    let harness = harness(true);

    let reply = harness
        .coordinator
        .handle(ask("chat-3", "price and stock of LZA406103A near Miami"))
        .await;

    assert_eq!(reply.plan.kinds(), vec![IntentKind::Pricing, IntentKind::StoreSearch]);
    assert!(reply.text.contains("Miami Branch"), "reply was: {}", reply.text);
    assert!(reply.text.contains("Sorry, I couldn't get pricing right now."));
    assert!(!reply.text.contains(ALL_FAILED_APOLOGY));
}

#[tokio::test]
async fn total_outage_is_a_single_apology() {
    let harness = harness(true);

    let reply = harness.coordinator.handle(ask("chat-4", "price of LZA406103A")).await;

    assert_eq!(reply.text, ALL_FAILED_APOLOGY);
    assert_eq!(reply.fragments.len(), 1);
}

#[tokio::test]
async fn pricing_is_listed_before_advice() {
    let harness = harness(false);

    let reply = harness
        .coordinator
        .handle(ask("chat-5", "price of LZA406103A and how do I winterize my pool"))
        .await;

    assert_eq!(reply.plan.kinds(), vec![IntentKind::Pricing, IntentKind::Advisory]);
    let price_at = reply.text.find("599.99").expect("price in reply");
    let advice_at = reply.text.find("Drain the lines").expect("advice in reply");
    assert!(price_at < advice_at, "reply was: {}", reply.text);
}

#[tokio::test]
async fn identical_requests_share_one_upstream_call() {
    let harness = harness(false);

    let (first, second) = tokio::join!(
        harness.coordinator.handle(ask("chat-6", "price of LZA406103A")),
        harness.coordinator.handle(ask("chat-7", "price of LZA406103A")),
    );
    let third = harness.coordinator.handle(ask("chat-8", "price of LZA406103A")).await;

    assert_eq!(harness.calls.pricing.load(Ordering::SeqCst), 1);
    for reply in [first, second, third] {
        assert!(reply.text.contains("599.99"));
    }
}

#[tokio::test]
async fn every_fragment_points_back_at_its_plan_entry() {
    let harness = harness(false);

    let reply = harness
        .coordinator
        .handle(ask("chat-9", "price of LZA406103A and how do I winterize my pool"))
        .await;

    let mut indexes =
        reply.fragments.iter().map(|fragment| fragment.plan_index()).collect::<Vec<_>>();
    indexes.sort();
    assert_eq!(indexes, vec![Some(0), Some(1)]);
    for fragment in &reply.fragments {
        let index = fragment.plan_index().expect("plan fragment");
        assert_eq!(fragment.intent.kind, reply.plan.entries()[index].kind);
    }
}

#[tokio::test]
async fn follow_up_pronoun_reuses_the_last_part_number() {
    let harness = harness(false);

    let first = harness.coordinator.handle(ask("chat-10", "tell me about LZA406103A")).await;
    assert!(first.text.contains("Pro-Grid Cartridge Element"), "reply was: {}", first.text);

    let follow_up = harness.coordinator.handle(ask("chat-10", "how much is it?")).await;

    let pricing = &follow_up.plan.entries()[0];
    assert_eq!(pricing.kind, IntentKind::Pricing);
    assert_eq!(pricing.slots.items[0].item_code, "LZA406103A");
    assert!(pricing.slots.from_context.contains(&SlotName::Items));
    assert!(follow_up.text.contains("599.99"));
}
