//! Query classifier: turns in-scope text into a [`DispatchPlan`].
//!
//! Pattern rules run first, clause by clause. Clauses they cannot place go to the LLM in a
//! single call. Missing slots are then filled from the rest of the query, then from the
//! conversation, and otherwise left marked unresolved for the specialist to handle.

pub mod patterns;
pub mod semantic;

use std::sync::Arc;

use poolchat_core::context::ConversationContext;
use poolchat_core::domain::intent::{
    Coordinates, DispatchPlan, Intent, IntentKind, PricingItem, SlotName, Slots,
};
use poolchat_core::domain::scope::{ScopeSignal, ScopeVerdict};
use poolchat_core::errors::OrchestrationError;

use crate::llm::LlmClient;
use crate::text::collapse_whitespace;

pub use patterns::{ClauseFacts, Cue, PatternRules};
pub use semantic::SemanticFallback;

/// Unplaced clauses shorter than this are treated as chatter when other clauses resolved.
const MIN_SEMANTIC_TOKENS: usize = 3;

pub struct QueryClassifier {
    rules: PatternRules,
    semantic: SemanticFallback,
    confidence_threshold: f32,
}

/// Slot values found anywhere in the query, used to complete clauses that lack them.
#[derive(Debug, Default)]
struct QueryFacts {
    codes: Vec<String>,
    unit: Option<&'static str>,
    coordinates: Option<Coordinates>,
    location: Option<String>,
    store_id: Option<String>,
}

impl QueryFacts {
    fn gather(clauses: &[ClauseFacts]) -> Self {
        let mut facts = Self::default();
        for clause in clauses {
            for code in &clause.codes {
                if !facts.codes.contains(code) {
                    facts.codes.push(code.clone());
                }
            }
            facts.unit = facts.unit.or(clause.unit);
            facts.coordinates = facts.coordinates.or(clause.coordinates);
            if facts.location.is_none() {
                facts.location = clause.location.clone();
            }
            if facts.store_id.is_none() {
                facts.store_id = clause.store_id.clone();
            }
        }
        facts
    }
}

impl QueryClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, confidence_threshold: f32) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: PatternRules::new()?,
            semantic: SemanticFallback::new(llm),
            confidence_threshold,
        })
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub async fn classify(
        &self,
        text: &str,
        verdict: &ScopeVerdict,
        context: &ConversationContext,
    ) -> DispatchPlan {
        if verdict.is_out_of_scope() {
            return DispatchPlan::unknown();
        }

        let clauses = self
            .rules
            .split_clauses(text)
            .iter()
            .map(|clause| self.rules.extract(clause))
            .collect::<Vec<_>>();
        let query = QueryFacts::gather(&clauses);

        let mut candidates = Vec::new();
        let mut unplaced = Vec::new();
        for clause in &clauses {
            let intents = clause.intents();
            if intents.is_empty() {
                unplaced.push(clause);
            } else {
                candidates.extend(intents);
            }
        }

        let worth_asking = unplaced
            .iter()
            .filter(|clause| candidates.is_empty() || clause.token_count() >= MIN_SEMANTIC_TOKENS)
            .map(|clause| clause.text.as_str())
            .collect::<Vec<_>>();
        if !worth_asking.is_empty() {
            candidates.extend(self.semantic.classify(&worth_asking.join(". ")).await);
        }

        for intent in &mut candidates {
            resolve_missing_slots(intent, &query, context);
        }

        let mut plan = DispatchPlan::default();
        for intent in batch_pricing(candidates) {
            plan.push(intent);
        }

        // Without a pool signal, only a confident placement justifies calling anyone.
        if verdict.signal == ScopeSignal::NoSignal && !self.has_confident_entry(&plan) {
            tracing::info!(
                event_name = "orchestration.classify.no_domain_evidence",
                intents = ?plan.kinds(),
                threshold = self.confidence_threshold,
                "ambiguous text without a confident intent; answering with help notice"
            );
            return DispatchPlan::unknown();
        }
        self.ensure_advisory_for_low_confidence(&mut plan, text);

        if plan.is_empty() {
            if !verdict.is_in_scope() {
                return DispatchPlan::unknown();
            }
            plan.push(advisory(text, 0.5));
        }

        tracing::debug!(
            event_name = "orchestration.classify.completed",
            intents = ?plan.kinds(),
            "built dispatch plan"
        );
        plan
    }

    fn has_confident_entry(&self, plan: &DispatchPlan) -> bool {
        plan.entries().iter().any(|entry| entry.confidence >= self.confidence_threshold)
    }

    fn ensure_advisory_for_low_confidence(&self, plan: &mut DispatchPlan, text: &str) {
        let weakest = plan
            .entries()
            .iter()
            .filter(|entry| entry.kind != IntentKind::Advisory)
            .filter(|entry| entry.confidence < self.confidence_threshold)
            .map(|entry| (entry.kind, entry.confidence))
            .next();

        if let Some((intent, confidence)) = weakest {
            let error = OrchestrationError::ClassificationLowConfidence { intent, confidence };
            tracing::info!(
                event_name = error.event_name(),
                intent = %intent,
                confidence,
                threshold = self.confidence_threshold,
                "adding advisory answer alongside low-confidence intent"
            );
            if !plan.contains(IntentKind::Advisory) {
                plan.push(advisory(text, confidence));
            }
        }
    }
}

fn advisory(text: &str, confidence: f32) -> Intent {
    Intent::new(
        IntentKind::Advisory,
        Slots::default().with_search_term(collapse_whitespace(text)),
        confidence,
    )
}

fn resolve_missing_slots(intent: &mut Intent, query: &QueryFacts, context: &ConversationContext) {
    let slots = &mut intent.slots;
    match intent.kind {
        IntentKind::ProductDetail if slots.part_number.is_none() => {
            if let Some(code) = query.codes.first() {
                slots.part_number = Some(code.clone());
            } else if let Some(code) = &context.last_part_number {
                slots.part_number = Some(code.clone());
                slots.mark_from_context(SlotName::PartNumber);
            } else {
                slots.mark_unresolved(SlotName::PartNumber);
            }
        }
        IntentKind::Pricing if slots.items.is_empty() => {
            if !query.codes.is_empty() {
                for code in &query.codes {
                    slots.add_item(PricingItem::new(code.as_str(), query.unit));
                }
            } else if let Some(code) = &context.last_part_number {
                slots.add_item(PricingItem::new(code.as_str(), query.unit));
                slots.mark_from_context(SlotName::Items);
            } else {
                slots.mark_unresolved(SlotName::Items);
            }
        }
        IntentKind::ProductSearch if slots.search_term.is_none() => {
            if let Some(term) = &context.last_search_term {
                slots.search_term = Some(term.clone());
                slots.mark_from_context(SlotName::SearchTerm);
            } else {
                slots.mark_unresolved(SlotName::SearchTerm);
            }
        }
        IntentKind::StoreSearch if slots.coordinates.is_none() && slots.location.is_none() => {
            if query.coordinates.is_some() || query.location.is_some() {
                slots.coordinates = query.coordinates;
                slots.location = query.location.clone();
            } else if let Some(coordinates) = context.last_coordinates {
                slots.coordinates = Some(coordinates);
                slots.mark_from_context(SlotName::Coordinates);
            } else if let Some(location) = &context.last_location {
                slots.location = Some(location.clone());
                slots.mark_from_context(SlotName::Location);
            } else {
                slots.mark_unresolved(SlotName::Location);
            }
        }
        IntentKind::StoreDetail if slots.store_id.is_none() => {
            if let Some(store_id) = &query.store_id {
                slots.store_id = Some(store_id.clone());
            } else if let Some(store_id) = &context.last_store_id {
                slots.store_id = Some(store_id.clone());
                slots.mark_from_context(SlotName::StoreId);
            } else {
                slots.mark_unresolved(SlotName::StoreId);
            }
        }
        IntentKind::Advisory if slots.search_term.is_none() => {
            slots.mark_unresolved(SlotName::SearchTerm);
        }
        _ => {}
    }
}

/// Folds every pricing entry into the first one so the plan prices all items in one call.
fn batch_pricing(candidates: Vec<Intent>) -> Vec<Intent> {
    let mut merged: Vec<Intent> = Vec::with_capacity(candidates.len());
    let mut batch_at = None;

    for intent in candidates {
        if intent.kind != IntentKind::Pricing {
            merged.push(intent);
            continue;
        }
        let Some(at) = batch_at else {
            batch_at = Some(merged.len());
            merged.push(intent);
            continue;
        };
        let batch: &mut Intent = &mut merged[at];
        for item in intent.slots.items {
            batch.slots.add_item(item);
        }
        for slot in intent.slots.from_context {
            batch.slots.mark_from_context(slot);
        }
        batch.confidence = batch.confidence.max(intent.confidence);
    }

    if let Some(at) = batch_at {
        let slots = &mut merged[at].slots;
        if slots.items.is_empty() {
            slots.mark_unresolved(SlotName::Items);
        } else {
            slots.unresolved.retain(|slot| *slot != SlotName::Items);
        }
    }
    merged
}
