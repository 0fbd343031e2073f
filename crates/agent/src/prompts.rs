//! Prompt templates. Every prompt keeps the model inside the pool equipment domain.

use crate::llm::PromptContext;

const DOMAIN_PREAMBLE: &str = "You work for a pool equipment distributor. Only discuss pools, \
spas, pool equipment, parts, chemicals, maintenance, pricing, and store locations. If asked \
about anything else, say you can only help with pool equipment.";

const ADVISORY_SYSTEM: &str = "You are an expert in pool equipment and maintenance. Give \
helpful technical advice that is clear and easy to understand, with step-by-step instructions \
when appropriate and safety precautions when relevant. Mention specific product types briefly \
if they would help. Keep the answer concise.";

const CLASSIFICATION_SYSTEM: &str = r#"You classify customer messages for a pool equipment assistant.
Respond with ONLY a JSON object of this exact shape and nothing else:
{"intents":[{"intent":"<label>","confidence":<0.0-1.0>,"slots":{"search_term":null,"part_number":null,"store_id":null,"location":null,"latitude":null,"longitude":null,"items":[]}}]}
Allowed labels: product_search, product_detail, pricing, store_search, store_detail, advisory, unknown.
- product_search: looking for products by description.
- product_detail: asking about one specific part number.
- pricing: price, cost, stock or availability of part numbers; put them in items as {"item_code":"...","unit":"EA"}.
- store_search: finding stores near a place; set location or latitude/longitude.
- store_detail: asking about one specific store or branch id.
- advisory: how-to, maintenance, troubleshooting, or general pool questions.
- unknown: anything else.
Use null for slots you cannot fill. Never invent part numbers."#;

const GEOCODE_SYSTEM: &str = "You are a geocoding assistant. Given a location name or US ZIP \
code, respond with ONLY a JSON object {\"latitude\": <number>, \"longitude\": <number>}. If you \
do not recognize the location, respond with ONLY the text UNKNOWN_LOCATION.";

const SYNTHESIS_SYSTEM: &str = "You combine answers from several pool equipment specialists \
into one reply for a chat message. Keep every fact exactly as given, including prices, part \
numbers, store names and hours. Present facts in the order given, with product, pricing and \
store facts before general advice. Do not add facts. Keep it short and readable.";

pub const UNKNOWN_LOCATION: &str = "UNKNOWN_LOCATION";

pub fn advisory(question: &str) -> PromptContext {
    PromptContext::new()
        .system(format!("{DOMAIN_PREAMBLE}\n\n{ADVISORY_SYSTEM}"))
        .user(question.to_string())
        .with_temperature(0.7)
        .with_max_tokens(600)
}

pub fn classification(text: &str) -> PromptContext {
    PromptContext::new()
        .system(CLASSIFICATION_SYSTEM)
        .user(text.to_string())
        .with_temperature(0.1)
        .with_max_tokens(300)
}

pub fn geocode(location: &str) -> PromptContext {
    PromptContext::new()
        .system(GEOCODE_SYSTEM)
        .user(format!("Location: {location}"))
        .with_temperature(0.0)
        .with_max_tokens(60)
}

pub fn synthesis(question: &str, facts: &str) -> PromptContext {
    PromptContext::new()
        .system(format!("{DOMAIN_PREAMBLE}\n\n{SYNTHESIS_SYSTEM}"))
        .user(format!("Customer message: {question}\n\nSpecialist answers, in order:\n{facts}"))
        .with_temperature(0.3)
        .with_max_tokens(800)
}

/// Strips a Markdown code fence some models wrap around JSON answers.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
