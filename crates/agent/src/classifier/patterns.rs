//! Deterministic pattern rules: clause splitting, cue detection and slot extraction.

use std::collections::BTreeSet;

use poolchat_core::domain::intent::{Coordinates, Intent, IntentKind, PricingItem, Slots};
use regex::Regex;

use crate::text::{collapse_whitespace, normalize_text, stem, tokenize, PRODUCT_CODE_PATTERN};

const PRICING_WORDS: &[&str] =
    &["price", "pricing", "cost", "stock", "inventory", "availability", "available", "expensive"];
const PRICING_PHRASES: &[&str] = &["how much", "in stock", "on hand"];

const STORE_WORDS: &[&str] = &[
    "store", "branch", "location", "locate", "nearby", "nearest", "closest", "near", "hour",
    "address", "direction", "warehouse",
];
const STORE_PHRASES: &[&str] = &["are you open", "when do you open", "when are you open", "open today"];

const DETAIL_WORDS: &[&str] =
    &["detail", "spec", "specification", "feature", "dimension", "describe", "datasheet"];
const DETAIL_PHRASES: &[&str] = &["tell me about", "tell me more", "more info", "more about"];

const SEARCH_WORDS: &[&str] = &[
    "search", "find", "looking", "show", "recommend", "sell", "carry", "buy", "suggest",
    "option", "alternative",
];
const SEARCH_PHRASES: &[&str] = &["look for"];
const WEAK_SEARCH_WORDS: &[&str] = &["need", "want", "have", "get"];

const PRODUCT_NOUNS: &[&str] = &[
    "pump", "filter", "heater", "cartridge", "chlorinator", "chlorine", "cleaner", "vacuum",
    "motor", "impeller", "gasket", "oring", "valve", "skimmer", "light", "ladder", "cover",
    "liner", "chemical", "cell", "salt", "sand", "timer", "controller", "automation", "part",
    "product", "equipment", "hose", "basket", "lid", "seal", "tablet", "brush", "net",
];

const ADVISORY_WORDS: &[&str] = &[
    "fix", "troubleshoot", "repair", "cloudy", "green", "leak", "maintain", "maintenance",
    "winterize", "balance", "install", "clean", "noise", "noisy", "problem", "issue", "broken",
    "advice", "tip", "error", "foam",
];
const ADVISORY_PHRASES: &[&str] = &[
    "how do", "how to", "how can", "how often", "how long", "why", "should i", "what should",
    "what causes", "is it safe", "help with",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "i", "im", "me", "my", "we", "our", "you", "your", "do", "does", "did",
    "is", "are", "was", "be", "can", "could", "would", "will", "please", "for", "of", "to",
    "in", "on", "at", "with", "and", "or", "any", "some", "what", "which", "where", "who",
    "have", "has", "need", "want", "looking", "look", "find", "search", "show", "get", "buy",
    "sell", "carry", "recommend", "suggest", "there", "this", "that", "it", "them", "those",
    "these", "about", "tell", "also", "plus", "then", "s", "d", "m", "t", "ll", "re", "ve",
    "like", "how", "much", "many", "by", "page", "within", "mile", "miles", "mi", "near",
    "nearby", "nearest", "closest", "around", "close", "here", "options", "option", "more",
    "info", "details", "detail", "something", "anything",
];

const SELF_LOCATIONS: &[&str] = &["me", "here", "my location", "my house", "my home", "you", "us"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cue {
    Pricing,
    Store,
    StoreReference,
    Detail,
    Search,
    WeakSearch,
    ProductNoun,
    Advisory,
}

/// Everything the pattern rules found in one clause.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClauseFacts {
    pub text: String,
    pub cues: BTreeSet<Cue>,
    pub codes: Vec<String>,
    pub unit: Option<&'static str>,
    pub coordinates: Option<Coordinates>,
    pub location: Option<String>,
    pub store_id: Option<String>,
    pub radius_miles: Option<u32>,
    pub page: Option<u32>,
    pub search_term: Option<String>,
}

impl ClauseFacts {
    pub fn has(&self, cue: Cue) -> bool {
        self.cues.contains(&cue)
    }

    pub fn token_count(&self) -> usize {
        tokenize(&self.text).len()
    }

    /// Intents implied by the clause. Required slots may still be missing; the classifier
    /// fills them from the rest of the query or the conversation.
    pub fn intents(&self) -> Vec<Intent> {
        let mut intents = Vec::new();

        if self.has(Cue::Pricing) {
            let mut slots = Slots::default();
            for code in &self.codes {
                slots.add_item(PricingItem::new(code.as_str(), self.unit));
            }
            let confidence = if self.codes.is_empty() { 0.75 } else { 0.95 };
            intents.push(Intent::new(IntentKind::Pricing, slots, confidence));
        }

        if !self.codes.is_empty() && (self.has(Cue::Detail) || !self.has(Cue::Pricing)) {
            let confidence = if self.has(Cue::Detail) { 0.9 } else { 0.85 };
            for code in &self.codes {
                let slots = Slots::default().with_part_number(code.as_str());
                intents.push(Intent::new(IntentKind::ProductDetail, slots, confidence));
            }
        } else if self.codes.is_empty()
            && self.has(Cue::Detail)
            && !self.has(Cue::ProductNoun)
        {
            intents.push(Intent::new(IntentKind::ProductDetail, Slots::default(), 0.7));
        }

        if self.codes.is_empty() && self.wants_product_search() {
            let mut slots = Slots { page: self.page, ..Slots::default() };
            slots.search_term = self.search_term.clone();
            let confidence = match (self.has(Cue::Search), self.has(Cue::ProductNoun)) {
                (true, true) => 0.85,
                (false, true) => 0.75,
                (true, false) => 0.55,
                (false, false) => 0.5,
            };
            intents.push(Intent::new(IntentKind::ProductSearch, slots, confidence));
        }

        if self.has(Cue::Store) || self.store_id.is_some() {
            let has_place = self.coordinates.is_some() || self.location.is_some();
            if let Some(store_id) = &self.store_id {
                let slots = Slots::default().with_store_id(store_id.as_str());
                intents.push(Intent::new(IntentKind::StoreDetail, slots, 0.9));
            } else if self.has(Cue::StoreReference) && !has_place {
                intents.push(Intent::new(IntentKind::StoreDetail, Slots::default(), 0.8));
            } else {
                let slots = Slots {
                    coordinates: self.coordinates,
                    location: self.location.clone(),
                    radius_miles: self.radius_miles,
                    page: self.page,
                    ..Slots::default()
                };
                let confidence = if has_place { 0.9 } else { 0.75 };
                intents.push(Intent::new(IntentKind::StoreSearch, slots, confidence));
            }
        }

        if self.has(Cue::Advisory) {
            let slots = Slots::default().with_search_term(collapse_whitespace(&self.text));
            intents.push(Intent::new(IntentKind::Advisory, slots, 0.8));
        }

        intents
    }

    fn wants_product_search(&self) -> bool {
        let only_weak = self.cues.iter().all(|cue| *cue == Cue::WeakSearch);
        let store_only = self.has(Cue::Store) && !self.has(Cue::ProductNoun);
        !store_only
            && (self.has(Cue::Search)
                || (self.has(Cue::ProductNoun) && !self.has(Cue::Advisory))
                || (self.has(Cue::WeakSearch) && only_weak))
    }
}

pub struct PatternRules {
    product_code: Regex,
    conjunction: Regex,
    coordinates: Regex,
    store_id: Regex,
    store_reference: Regex,
    radius: Regex,
    unit: Regex,
    page: Regex,
    zip: Regex,
    near: Regex,
    in_place: Regex,
}

impl PatternRules {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            product_code: Regex::new(PRODUCT_CODE_PATTERN)?,
            conjunction: Regex::new(r"(?i)\s+(?:and also|and then|and|also|plus|then)\s+")?,
            coordinates: Regex::new(r"(-?\d{1,2}\.\d+)\s*,\s*(-?\d{1,3}\.\d+)")?,
            store_id: Regex::new(
                r"(?i)\b(?:branch|store)\s*(?:#|no\.?|number|id)?\s*#?\s*(\d{1,6})\b",
            )?,
            store_reference: Regex::new(
                r"(?i)\b(?:that|this|the same|same)\s+(?:store|branch|location)\b",
            )?,
            radius: Regex::new(r"(?i)\bwithin\s+(\d{1,3})\s*(?:mi|mile|miles)\b")?,
            unit: Regex::new(
                r"(?i)\b(?:per|by the|by|a|one)\s+(case|cases|box|boxes|pack|packs|each|ea|pallet|pallets)\b",
            )?,
            page: Regex::new(r"(?i)\bpage\s+(\d{1,3})\b")?,
            zip: Regex::new(r"\b(\d{5})\b")?,
            near: Regex::new(
                r"(?i)\b(?:near|around|close to|closest to|nearest to)\s+(.+?)(?:\s+(?:and|for|with|within|that|which|to|on)\b|[,.?!;]|$)",
            )?,
            in_place: Regex::new(r"\b[Ii]n\s+([A-Z][A-Za-z.'-]*(?:\s+[A-Z][A-Za-z.'-]*){0,3})")?,
        })
    }

    /// Splits a message into independent clauses. Sentence punctuation always splits;
    /// conjunctions split only when every resulting piece carries its own cue.
    pub fn split_clauses(&self, text: &str) -> Vec<String> {
        let mut clauses = Vec::new();
        for sentence in split_sentences(text) {
            let pieces = self
                .conjunction
                .split(&sentence)
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>();
            if pieces.len() > 1 && pieces.iter().all(|piece| !self.cues(piece).is_empty()) {
                clauses.extend(pieces.into_iter().map(str::to_string));
            } else {
                clauses.push(sentence);
            }
        }
        clauses
    }

    pub fn cues(&self, clause: &str) -> BTreeSet<Cue> {
        let normalized = normalize_text(clause);
        let tokens = tokenize(&normalized);
        let stems = tokens.iter().map(|token| stem(token)).collect::<BTreeSet<_>>();
        let padded = format!(" {} ", tokens.join(" "));

        let any_word = |words: &[&str]| words.iter().any(|word| stems.contains(&stem(word)));
        let any_phrase =
            |phrases: &[&str]| phrases.iter().any(|phrase| padded.contains(&format!(" {phrase} ")));

        let mut cues = BTreeSet::new();
        if any_word(PRICING_WORDS) || any_phrase(PRICING_PHRASES) || clause.contains('$') {
            cues.insert(Cue::Pricing);
        }
        if any_word(STORE_WORDS) || any_phrase(STORE_PHRASES) {
            cues.insert(Cue::Store);
        }
        if self.store_reference.is_match(clause) {
            cues.insert(Cue::StoreReference);
        }
        if any_word(DETAIL_WORDS) || any_phrase(DETAIL_PHRASES) {
            cues.insert(Cue::Detail);
        }
        if any_word(SEARCH_WORDS) || any_phrase(SEARCH_PHRASES) {
            cues.insert(Cue::Search);
        }
        if any_word(WEAK_SEARCH_WORDS) {
            cues.insert(Cue::WeakSearch);
        }
        if any_word(PRODUCT_NOUNS) {
            cues.insert(Cue::ProductNoun);
        }
        if any_word(ADVISORY_WORDS) || any_phrase(ADVISORY_PHRASES) {
            cues.insert(Cue::Advisory);
        }
        cues
    }

    pub fn extract(&self, clause: &str) -> ClauseFacts {
        let cues = self.cues(clause);

        let mut codes = Vec::new();
        for found in self.product_code.find_iter(clause) {
            let code = found.as_str().to_ascii_uppercase();
            if !codes.contains(&code) {
                codes.push(code);
            }
        }

        let coordinates = self.coordinates.captures(clause).and_then(|captures| {
            let latitude = captures.get(1)?.as_str().parse::<f64>().ok()?;
            let longitude = captures.get(2)?.as_str().parse::<f64>().ok()?;
            Coordinates::new(latitude, longitude)
        });

        let store_id = self.capture(&self.store_id, clause);
        let radius_miles = self.capture(&self.radius, clause).and_then(|raw| raw.parse().ok());
        let page = self.capture(&self.page, clause).and_then(|raw| raw.parse().ok());
        let unit = self.capture(&self.unit, clause).and_then(|raw| normalize_unit(&raw));

        let location = if coordinates.is_none() && cues.contains(&Cue::Store) {
            self.location(clause, store_id.as_deref())
        } else {
            None
        };

        let search_term = search_term(clause, &codes, location.as_deref());

        ClauseFacts {
            text: clause.trim().to_string(),
            cues,
            codes,
            unit,
            coordinates,
            location,
            store_id,
            radius_miles,
            page,
            search_term,
        }
    }

    fn location(&self, clause: &str, store_id: Option<&str>) -> Option<String> {
        if let Some(place) = self.capture(&self.near, clause) {
            let place = place.trim().trim_start_matches("the ").trim();
            if SELF_LOCATIONS.contains(&place.to_ascii_lowercase().as_str()) {
                return None;
            }
            if !place.is_empty() {
                return Some(place.to_string());
            }
        }
        if let Some(zip) = self.capture(&self.zip, clause) {
            if store_id != Some(zip.as_str()) {
                return Some(zip);
            }
        }
        self.capture(&self.in_place, clause).map(|place| place.trim_end_matches('.').to_string())
    }

    fn capture(&self, regex: &Regex, text: &str) -> Option<String> {
        regex
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().trim().to_string())
            .filter(|found| !found.is_empty())
    }
}

pub fn normalize_unit(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "each" | "ea" => Some("EA"),
        "case" | "cases" | "cs" => Some("CS"),
        "box" | "boxes" | "bx" => Some("BX"),
        "pack" | "packs" | "pk" => Some("PK"),
        "pallet" | "pallets" | "pl" => Some("PL"),
        _ => None,
    }
}

/// Splits on `? ! ; newline`, and on `.` followed by whitespace unless it closes a short
/// abbreviation such as "St." or "Dr.".
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(character) = chars.next() {
        let breaks = match character {
            '?' | '!' | ';' | '\n' => true,
            '.' => {
                let followed_by_space = chars.peek().map_or(true, |next| next.is_whitespace());
                let last_word = current.split_whitespace().last().unwrap_or("");
                followed_by_space && last_word.chars().filter(|c| c.is_alphanumeric()).count() > 2
            }
            _ => false,
        };
        if breaks {
            push_sentence(&mut sentences, &mut current);
        } else {
            current.push(character);
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let sentence = collapse_whitespace(current);
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    current.clear();
}

fn search_term(clause: &str, codes: &[String], location: Option<&str>) -> Option<String> {
    let location_tokens = location.map(|place| tokenize(place)).unwrap_or_default();
    let cue_words = PRICING_WORDS.iter().chain(STORE_WORDS).chain(ADVISORY_WORDS).chain(DETAIL_WORDS);
    let cue_stems = cue_words.map(|word| stem(word)).collect::<BTreeSet<_>>();

    let kept = tokenize(&normalize_text(clause))
        .into_iter()
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .filter(|token| !cue_stems.contains(&stem(token)))
        .filter(|token| !location_tokens.contains(token))
        .filter(|token| !codes.iter().any(|code| code.eq_ignore_ascii_case(token)))
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>();

    (!kept.is_empty()).then(|| kept.join(" "))
}

#[cfg(test)]
mod tests {
    use poolchat_core::domain::intent::{IntentKind, PricingItem};

    use super::{Cue, PatternRules};

    fn rules() -> PatternRules {
        PatternRules::new().expect("patterns compile")
    }

    #[test]
    fn price_of_code_yields_single_pricing_intent() {
        let facts = rules().extract("price of LZA406103A");
        let intents = facts.intents();

        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, IntentKind::Pricing);
        assert_eq!(intents[0].slots.items, vec![PricingItem::new("LZA406103A", None)]);
    }

    #[test]
    fn bare_code_is_a_detail_lookup() {
        let intents = rules().extract("lza406103a").intents();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, IntentKind::ProductDetail);
        assert_eq!(intents[0].slots.part_number.as_deref(), Some("LZA406103A"));
    }

    #[test]
    fn unit_words_are_normalized() {
        let facts = rules().extract("price per case of LZA406103A");
        assert_eq!(facts.unit, Some("CS"));
        assert_eq!(facts.intents()[0].slots.items[0].unit, "CS");
    }

    #[test]
    fn store_slots_are_extracted() {
        let rules = rules();

        let by_id = rules.extract("what are the hours for store #123");
        assert_eq!(by_id.store_id.as_deref(), Some("123"));
        assert_eq!(by_id.intents()[0].kind, IntentKind::StoreDetail);

        let nearby = rules.extract("stores near Miami within 25 miles");
        assert_eq!(nearby.location.as_deref(), Some("Miami"));
        assert_eq!(nearby.radius_miles, Some(25));

        let coordinates = rules.extract("closest branch to 25.7617, -80.1918");
        let coordinates = coordinates.coordinates.expect("coordinates parsed");
        assert_eq!(coordinates.latitude, 25.7617);

        let zip = rules.extract("is there a store in 33101");
        assert_eq!(zip.location.as_deref(), Some("33101"));

        let me = rules.extract("find a store near me");
        assert_eq!(me.location, None);
    }

    #[test]
    fn conjunctions_split_only_between_cued_pieces() {
        let rules = rules();
        assert_eq!(
            rules.split_clauses("price of LZA406103A and how do I install it"),
            vec!["price of LZA406103A".to_owned(), "how do I install it".to_owned()]
        );
        assert_eq!(
            rules.split_clauses("price of AAA100001, BBB200002 and CCC300003"),
            vec!["price of AAA100001, BBB200002 and CCC300003".to_owned()]
        );
    }

    #[test]
    fn sentences_split_on_punctuation_but_not_abbreviations() {
        let rules = rules();
        assert_eq!(
            rules.split_clauses("Is there a store in St. Louis? My pool is green."),
            vec!["Is there a store in St. Louis".to_owned(), "My pool is green".to_owned()]
        );
    }

    #[test]
    fn search_terms_drop_filler_words() {
        let facts = rules().extract("I'm looking for a variable speed pump");
        assert!(facts.has(Cue::Search));
        assert_eq!(facts.search_term.as_deref(), Some("variable speed pump"));
        assert_eq!(facts.intents()[0].kind, IntentKind::ProductSearch);
    }

    #[test]
    fn advisory_question_about_equipment_is_not_a_search() {
        let kinds = rules()
            .extract("how do I fix my pool pump")
            .intents()
            .into_iter()
            .map(|intent| intent.kind)
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![IntentKind::Advisory]);
    }

    #[test]
    fn store_reference_without_place_is_a_detail_lookup() {
        let intents = rules().extract("what time does that store close").intents();
        assert!(intents.iter().any(|intent| intent.kind == IntentKind::StoreDetail));
    }
}
