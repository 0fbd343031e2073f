//! Scope filter: decides whether a message belongs to the pool equipment domain.
//!
//! Layers run in order and an earlier in-scope signal is never overridden:
//! 1. part-number pattern
//! 2. domain keywords
//! 3. unrelated topics (only when nothing positive matched)
//! 4. fallback to ambiguous, noting a pronoun when the session has history

use std::collections::BTreeSet;

use poolchat_core::context::ConversationContext;
use poolchat_core::domain::scope::{ScopeSignal, ScopeVerdict};
use regex::Regex;

use crate::text::{normalize_text, stem, tokenize, PRODUCT_CODE_PATTERN};

const DOMAIN_KEYWORDS: &[&str] = &[
    "pool", "spa", "hottub", "tub", "pump", "filter", "cartridge", "heater", "chlorine",
    "chlorinator", "salt", "cell", "chemical", "cleaner", "vacuum", "motor", "impeller",
    "gasket", "oring", "valve", "skimmer", "drain", "plumbing", "pipe", "liner", "cover",
    "ladder", "ph", "alkalinity", "acid", "shock", "algae", "sanitizer", "backwash", "hayward",
    "pentair", "jandy", "zodiac", "polaris", "aqua", "intex", "bestway", "maintenance",
    "repair", "install", "warranty", "manual", "part", "replacement", "component",
    "equipment", "accessory", "diagram", "schematic", "product", "sku", "price", "pricing",
    "cost", "stock", "inventory", "availability", "store", "branch", "location", "warehouse",
];

const NEGATIVE_TOPICS: &[(&str, &[&str])] = &[
    ("weather", &["weather", "forecast", "rain", "snow", "tornado", "humidity", "sunny"]),
    ("politics", &[
        "politics", "political", "president", "election", "vote", "government", "senator",
        "congress", "democrat", "republican", "minister", "campaign",
    ]),
    ("entertainment", &[
        "movie", "film", "actor", "actress", "netflix", "music", "song", "album", "concert",
        "celebrity", "tv", "television", "episode", "joke",
    ]),
    ("sports", &[
        "sport", "football", "soccer", "basketball", "baseball", "cricket", "tennis", "golf",
        "hockey", "nfl", "nba", "tournament", "olympics",
    ]),
    ("technology", &[
        "iphone", "android", "laptop", "smartphone", "computer", "software", "internet",
        "wifi", "facebook", "twitter", "instagram", "tiktok", "youtube",
    ]),
    ("finance", &[
        "bitcoin", "crypto", "blockchain", "mortgage", "loan", "bank", "inflation", "economy",
        "invest", "nft",
    ]),
    ("health", &[
        "doctor", "hospital", "medicine", "prescription", "symptom", "disease", "covid",
        "vaccine", "diet", "workout", "gym",
    ]),
    ("education", &["school", "college", "university", "homework", "exam", "professor", "student"]),
];

const NEGATIVE_PHRASES: &[(&str, &str)] = &[
    ("general_knowledge", r"\bwhat(?:'s| is) the (?:capital|population|currency|language) of\b"),
    ("general_knowledge", r"\bhow (?:tall|old|far|big) is\b"),
    ("general_knowledge", r"\bwhat time is it\b"),
    ("politics", r"\bwho (?:is|was) the (?:president|prime minister|king|queen)\b"),
    ("weather", r"\bwhat(?:'s| is) the weather\b"),
    ("entertainment", r"\btell me a (?:joke|story)\b"),
];

const REFERENCE_WORDS: &[&str] = &["it", "that", "this", "those", "them", "same", "one"];

pub struct ScopeFilter {
    product_code: Regex,
    keywords: BTreeSet<String>,
    topics: Vec<(&'static str, BTreeSet<String>)>,
    phrases: Vec<(&'static str, Regex)>,
}

impl ScopeFilter {
    pub fn new() -> Result<Self, regex::Error> {
        let product_code = Regex::new(PRODUCT_CODE_PATTERN)?;
        let keywords = DOMAIN_KEYWORDS.iter().map(|keyword| stem(keyword)).collect();
        let topics = NEGATIVE_TOPICS
            .iter()
            .map(|(topic, words)| (*topic, words.iter().map(|word| stem(word)).collect()))
            .collect();
        let phrases = NEGATIVE_PHRASES
            .iter()
            .map(|(topic, pattern)| Regex::new(pattern).map(|regex| (*topic, regex)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { product_code, keywords, topics, phrases })
    }

    /// Pure function of its inputs: the same text and context always give the same verdict.
    pub fn classify_scope(&self, text: &str, context: &ConversationContext) -> ScopeVerdict {
        if let Some(code) = self.product_code.find(text) {
            return ScopeVerdict::in_scope(ScopeSignal::ProductCode(
                code.as_str().to_ascii_uppercase(),
            ));
        }

        let normalized = normalize_text(text);
        let tokens = tokenize(&normalized);
        let stems = tokens.iter().map(|token| stem(token)).collect::<Vec<_>>();

        let mut matched = Vec::new();
        for stemmed in &stems {
            if self.keywords.contains(stemmed) && !matched.contains(stemmed) {
                matched.push(stemmed.clone());
            }
        }
        if !matched.is_empty() {
            return ScopeVerdict::in_scope(ScopeSignal::DomainKeywords(matched));
        }

        if let Some(topic) = self.negative_topic(&normalized, &stems) {
            return ScopeVerdict::out_of_scope(topic);
        }

        if context.has_history() {
            if let Some(reference) =
                tokens.iter().find(|token| REFERENCE_WORDS.contains(&token.as_str()))
            {
                return ScopeVerdict::ambiguous(ScopeSignal::ContextReference(reference.clone()));
            }
        }

        ScopeVerdict::ambiguous(ScopeSignal::NoSignal)
    }

    fn negative_topic(&self, normalized: &str, stems: &[String]) -> Option<&'static str> {
        self.phrases
            .iter()
            .find(|(_, phrase)| phrase.is_match(normalized))
            .map(|(topic, _)| *topic)
            .or_else(|| {
                self.topics
                    .iter()
                    .find(|(_, words)| stems.iter().any(|stemmed| words.contains(stemmed)))
                    .map(|(topic, _)| *topic)
            })
    }
}

#[cfg(test)]
mod tests {
    use poolchat_core::context::ConversationContext;
    use poolchat_core::domain::intent::DispatchPlan;
    use poolchat_core::domain::query::SessionId;
    use poolchat_core::domain::scope::{ScopeDecision, ScopeSignal};

    use super::ScopeFilter;

    fn filter() -> ScopeFilter {
        ScopeFilter::new().expect("scope patterns compile")
    }

    fn fresh() -> ConversationContext {
        ConversationContext::new(SessionId::from("scope-test"), 10)
    }

    #[test]
    fn product_code_alone_is_in_scope() {
        let verdict = filter().classify_scope("LZA406103A?", &fresh());
        assert_eq!(verdict.decision, ScopeDecision::InScope);
        assert_eq!(verdict.signal, ScopeSignal::ProductCode("LZA406103A".to_owned()));
    }

    #[test]
    fn product_code_wins_over_unrelated_topics() {
        let verdict =
            filter().classify_scope("is sp3200vsp better than bitcoin for the election", &fresh());
        assert_eq!(verdict.decision, ScopeDecision::InScope);
        assert_eq!(verdict.product_code(), Some("SP3200VSP"));
    }

    #[test]
    fn stemmed_keywords_mark_in_scope() {
        let verdict = filter().classify_scope("Do you sell variable speed PUMPS?", &fresh());
        assert_eq!(verdict.decision, ScopeDecision::InScope);
        assert_eq!(verdict.signal, ScopeSignal::DomainKeywords(vec!["pump".to_owned()]));
    }

    #[test]
    fn keywords_beat_negative_topics() {
        let verdict = filter().classify_scope("will rain hurt my pool cover", &fresh());
        assert_eq!(verdict.decision, ScopeDecision::InScope);
    }

    #[test]
    fn unrelated_topics_are_out_of_scope() {
        let filter = filter();
        for (text, topic) in [
            ("what's the weather today", "weather"),
            ("What is the capital of France?", "general_knowledge"),
            ("who won the football game last night", "sports"),
            ("should I buy bitcoin", "finance"),
            ("tell me a joke", "entertainment"),
        ] {
            let verdict = filter.classify_scope(text, &fresh());
            assert_eq!(verdict.decision, ScopeDecision::OutOfScope, "{text}");
            assert_eq!(verdict.signal, ScopeSignal::NegativeTopic(topic.to_owned()), "{text}");
        }
    }

    #[test]
    fn unmatched_text_is_ambiguous() {
        let verdict = filter().classify_scope("hello there", &fresh());
        assert_eq!(verdict.decision, ScopeDecision::Ambiguous);
        assert_eq!(verdict.signal, ScopeSignal::NoSignal);
    }

    #[test]
    fn pronoun_with_history_is_noted_as_context_reference() {
        let mut context = fresh();
        context.record("price of LZA406103A", &DispatchPlan::default(), &[]);

        let verdict = filter().classify_scope("how much is it?", &context);
        assert_eq!(verdict.decision, ScopeDecision::Ambiguous);
        assert_eq!(verdict.signal, ScopeSignal::ContextReference("it".to_owned()));
    }

    #[test]
    fn verdict_is_deterministic() {
        let filter = filter();
        let context = fresh();
        let first = filter.classify_scope("filter cartridge for a spa", &context);
        let second = filter.classify_scope("filter cartridge for a spa", &context);
        assert_eq!(first, second);
    }
}
