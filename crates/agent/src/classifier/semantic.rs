//! LLM fallback for clauses the pattern rules could not place.
//!
//! The model answers in a closed JSON schema. Anything outside the intent set, or any slot
//! value that fails validation, is dropped rather than trusted.

use std::sync::Arc;

use poolchat_core::domain::intent::{Coordinates, Intent, IntentKind, PricingItem, Slots};
use serde::Deserialize;
use serde_json::Value;

use crate::classifier::patterns::normalize_unit;
use crate::llm::LlmClient;
use crate::prompts;

const MAX_SLOT_CHARS: usize = 120;
const DEFAULT_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Default, Deserialize)]
struct SemanticPlan {
    #[serde(default)]
    intents: Vec<SemanticIntent>,
}

#[derive(Debug, Deserialize)]
struct SemanticIntent {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    slots: SemanticSlots,
}

#[derive(Debug, Default, Deserialize)]
struct SemanticSlots {
    #[serde(default)]
    search_term: Option<String>,
    #[serde(default)]
    part_number: Option<String>,
    #[serde(default)]
    store_id: Option<Value>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    items: Vec<SemanticItem>,
}

#[derive(Debug, Deserialize)]
struct SemanticItem {
    item_code: String,
    #[serde(default)]
    unit: Option<String>,
}

pub struct SemanticFallback {
    llm: Arc<dyn LlmClient>,
}

impl SemanticFallback {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classifies `text` with one model call. Failures yield no intents.
    pub async fn classify(&self, text: &str) -> Vec<Intent> {
        let raw = match self.llm.complete(&prompts::classification(text)).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(
                    event_name = "orchestration.classify.semantic_failed",
                    error = %error,
                    "semantic classification unavailable; continuing with pattern rules only"
                );
                return Vec::new();
            }
        };
        parse_plan(&raw, text)
    }
}

/// Parses a model answer into intents, keeping only values that fit the closed schema.
pub fn parse_plan(raw: &str, source_text: &str) -> Vec<Intent> {
    let plan: SemanticPlan = match serde_json::from_str(prompts::strip_code_fence(raw)) {
        Ok(plan) => plan,
        Err(error) => {
            tracing::warn!(
                event_name = "orchestration.classify.semantic_invalid",
                error = %error,
                "semantic classifier answered outside the schema"
            );
            return Vec::new();
        }
    };

    plan.intents
        .into_iter()
        .filter_map(|candidate| {
            let kind = IntentKind::parse(&candidate.intent)?;
            if kind == IntentKind::Unknown {
                return None;
            }
            let mut slots = sanitize_slots(candidate.slots, source_text);
            if kind == IntentKind::Advisory && slots.search_term.is_none() {
                slots.search_term = Some(source_text.trim().to_string());
            }
            let confidence = candidate
                .confidence
                .filter(|confidence| confidence.is_finite())
                .unwrap_or(DEFAULT_CONFIDENCE);
            Some(Intent::new(kind, slots, confidence))
        })
        .collect()
}

fn sanitize_slots(raw: SemanticSlots, source_text: &str) -> Slots {
    let source = source_text.to_ascii_lowercase();
    let mentioned = |code: &str| !code.is_empty() && source.contains(&code.to_ascii_lowercase());

    let mut slots = Slots {
        search_term: clean(raw.search_term),
        location: clean(raw.location),
        store_id: raw.store_id.and_then(|value| match value {
            Value::String(id) => clean(Some(id)),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }),
        coordinates: match (raw.latitude, raw.longitude) {
            (Some(latitude), Some(longitude)) => Coordinates::new(latitude, longitude),
            _ => None,
        },
        ..Slots::default()
    };

    if let Some(part_number) = clean(raw.part_number).filter(|code| mentioned(code)) {
        slots = slots.with_part_number(part_number);
    }
    for item in raw.items {
        let code = item.item_code.trim();
        if !mentioned(code) {
            continue;
        }
        let unit = item.unit.as_deref().and_then(normalize_unit);
        slots.add_item(PricingItem::new(code, unit));
    }
    slots
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value.chars().count() <= MAX_SLOT_CHARS)
        .filter(|value| !value.eq_ignore_ascii_case("null"))
}
