use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_UNIT: &str = "EA";
pub const DEFAULT_RADIUS_MILES: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntentKind {
    ProductSearch,
    ProductDetail,
    Pricing,
    StoreSearch,
    StoreDetail,
    Advisory,
    Unknown,
}

impl IntentKind {
    pub const ALL: [IntentKind; 7] = [
        IntentKind::ProductSearch,
        IntentKind::ProductDetail,
        IntentKind::Pricing,
        IntentKind::StoreSearch,
        IntentKind::StoreDetail,
        IntentKind::Advisory,
        IntentKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductSearch => "product_search",
            Self::ProductDetail => "product_detail",
            Self::Pricing => "pricing",
            Self::StoreSearch => "store_search",
            Self::StoreDetail => "store_detail",
            Self::Advisory => "advisory",
            Self::Unknown => "unknown",
        }
    }

    /// Parses the closed label set. Anything else is `None`, never a guess.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }

    /// Position in the fused reply. Structured facts come before prose.
    pub fn fusion_rank(&self) -> u8 {
        match self {
            Self::ProductDetail => 0,
            Self::ProductSearch => 1,
            Self::Pricing => 2,
            Self::StoreDetail => 3,
            Self::StoreSearch => 4,
            Self::Advisory => 5,
            Self::Unknown => 6,
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PricingItem {
    pub item_code: String,
    pub unit: String,
}

impl PricingItem {
    pub fn new(item_code: impl Into<String>, unit: Option<&str>) -> Self {
        let unit = unit.map(str::trim).filter(|unit| !unit.is_empty()).unwrap_or(DEFAULT_UNIT);
        Self {
            item_code: item_code.into().trim().to_ascii_uppercase(),
            unit: unit.to_ascii_uppercase(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    SearchTerm,
    PartNumber,
    Coordinates,
    Location,
    StoreId,
    Items,
}

impl SlotName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchTerm => "search_term",
            Self::PartNumber => "part_number",
            Self::Coordinates => "coordinates",
            Self::Location => "location",
            Self::StoreId => "store_id",
            Self::Items => "items",
        }
    }
}

/// Parameters extracted for one intent. `unresolved` and `from_context` are bookkeeping
/// and do not take part in the fingerprint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Slots {
    pub search_term: Option<String>,
    pub part_number: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub radius_miles: Option<u32>,
    pub location: Option<String>,
    pub store_id: Option<String>,
    pub items: Vec<PricingItem>,
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<SlotName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_context: Vec<SlotName>,
}

impl Slots {
    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn with_part_number(mut self, part_number: impl Into<String>) -> Self {
        self.part_number = Some(part_number.into().to_ascii_uppercase());
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_store_id(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    pub fn with_item(mut self, item: PricingItem) -> Self {
        self.add_item(item);
        self
    }

    /// Adds a pricing item, keeping the batch sorted and free of duplicates.
    pub fn add_item(&mut self, item: PricingItem) {
        if !self.items.contains(&item) {
            self.items.push(item);
            self.items.sort();
        }
    }

    pub fn mark_unresolved(&mut self, slot: SlotName) {
        if !self.unresolved.contains(&slot) {
            self.unresolved.push(slot);
        }
    }

    pub fn mark_from_context(&mut self, slot: SlotName) {
        self.unresolved.retain(|pending| *pending != slot);
        if !self.from_context.contains(&slot) {
            self.from_context.push(slot);
        }
    }

    /// Key/value pairs that identify this slot set, sorted by key.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(coordinates) = &self.coordinates {
            pairs.push(("coordinates", coordinates.to_string()));
        }
        if !self.items.is_empty() {
            let items = self
                .items
                .iter()
                .map(|item| format!("{}:{}", item.item_code, item.unit))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("items", items));
        }
        if let Some(location) = &self.location {
            pairs.push(("location", location.clone()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(part_number) = &self.part_number {
            pairs.push(("part_number", part_number.clone()));
        }
        if let Some(radius) = self.radius_miles {
            pairs.push(("radius_miles", radius.to_string()));
        }
        if let Some(term) = &self.search_term {
            pairs.push(("search_term", term.clone()));
        }
        if let Some(store_id) = &self.store_id {
            pairs.push(("store_id", store_id.clone()));
        }
        pairs.sort_by(|left, right| left.0.cmp(right.0));
        pairs
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub slots: Slots,
    pub confidence: f32,
}

impl Intent {
    pub fn new(kind: IntentKind, slots: Slots, confidence: f32) -> Self {
        Self { kind, slots, confidence: confidence.clamp(0.0, 1.0) }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.kind, &self.slots)
    }
}

/// Normalized cache key for an intent and its slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(kind: IntentKind, slots: &Slots) -> Self {
        let mut raw = String::from(kind.as_str());
        for (key, value) in slots.pairs() {
            raw.push('|');
            raw.push_str(key);
            raw.push('=');
            raw.push_str(&value);
        }
        Self(normalize(&raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTag {
    Resolved,
    Unknown,
}

/// Ordered intents to execute for one query. Entries with identical fingerprints are merged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    entries: Vec<Intent>,
    tag: PlanTag,
}

impl Default for DispatchPlan {
    fn default() -> Self {
        Self { entries: Vec::new(), tag: PlanTag::Resolved }
    }
}

impl DispatchPlan {
    pub fn unknown() -> Self {
        Self { entries: Vec::new(), tag: PlanTag::Unknown }
    }

    /// Appends an entry. Returns `false` when an identical entry was already present.
    pub fn push(&mut self, intent: Intent) -> bool {
        let fingerprint = intent.fingerprint();
        if let Some(existing) =
            self.entries.iter_mut().find(|entry| entry.fingerprint() == fingerprint)
        {
            existing.confidence = existing.confidence.max(intent.confidence);
            return false;
        }
        self.entries.push(intent);
        true
    }

    pub fn entries(&self) -> &[Intent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tag(&self) -> PlanTag {
        self.tag
    }

    pub fn is_unknown(&self) -> bool {
        self.tag == PlanTag::Unknown
    }

    pub fn contains(&self, kind: IntentKind) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    pub fn kinds(&self) -> Vec<IntentKind> {
        self.entries.iter().map(|entry| entry.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Coordinates, DispatchPlan, Fingerprint, Intent, IntentKind, PricingItem, SlotName, Slots,
    };

    #[test]
    fn fingerprint_is_case_and_whitespace_normalized() {
        let left = Slots::default().with_search_term("Variable  Speed Pump");
        let right = Slots::default().with_search_term("variable speed   pump");

        assert_eq!(
            Fingerprint::of(IntentKind::ProductSearch, &left),
            Fingerprint::of(IntentKind::ProductSearch, &right)
        );
        assert_eq!(
            Fingerprint::of(IntentKind::ProductSearch, &left).as_str(),
            "product_search|search_term=variable speed pump"
        );
    }

    #[test]
    fn fingerprint_differs_when_any_slot_value_differs() {
        let each = Slots::default().with_item(PricingItem::new("LZA406103A", None));
        let case = Slots::default().with_item(PricingItem::new("LZA406103A", Some("CS")));

        assert_ne!(
            Fingerprint::of(IntentKind::Pricing, &each),
            Fingerprint::of(IntentKind::Pricing, &case)
        );
        assert_ne!(
            Fingerprint::of(IntentKind::Pricing, &each),
            Fingerprint::of(IntentKind::ProductDetail, &each)
        );
    }

    #[test]
    fn fingerprint_ignores_bookkeeping_slots() {
        let plain = Slots::default().with_part_number("lza406103a");
        let mut traced = plain.clone();
        traced.mark_from_context(SlotName::PartNumber);
        traced.mark_unresolved(SlotName::Location);

        assert_eq!(
            Fingerprint::of(IntentKind::ProductDetail, &plain),
            Fingerprint::of(IntentKind::ProductDetail, &traced)
        );
    }

    #[test]
    fn fingerprint_pairs_are_sorted_by_key() {
        let slots = Slots::default()
            .with_store_id("12")
            .with_coordinates(Coordinates::new(25.7617, -80.1918).expect("valid coordinates"));

        assert_eq!(
            Fingerprint::of(IntentKind::StoreSearch, &slots).as_str(),
            "store_search|coordinates=25.7617,-80.1918|store_id=12"
        );
    }

    #[test]
    fn pricing_item_defaults_unit_and_uppercases_code() {
        let item = PricingItem::new(" lza406103a ", None);
        assert_eq!(item.item_code, "LZA406103A");
        assert_eq!(item.unit, "EA");
    }

    #[test]
    fn plan_merges_identical_entries_and_keeps_highest_confidence() {
        let mut plan = DispatchPlan::default();
        let slots = Slots::default().with_part_number("LZA406103A");

        assert!(plan.push(Intent::new(IntentKind::ProductDetail, slots.clone(), 0.7)));
        assert!(!plan.push(Intent::new(IntentKind::ProductDetail, slots, 0.9)));
        assert!(plan.push(Intent::new(IntentKind::Advisory, Slots::default(), 0.5)));

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.entries()[0].confidence, 0.9);
        assert_eq!(plan.kinds(), vec![IntentKind::ProductDetail, IntentKind::Advisory]);
    }

    #[test]
    fn unknown_plan_is_empty_and_tagged() {
        let plan = DispatchPlan::unknown();
        assert!(plan.is_empty());
        assert!(plan.is_unknown());
    }

    #[test]
    fn intent_labels_parse_only_from_the_closed_set() {
        assert_eq!(IntentKind::parse("Store Search"), Some(IntentKind::StoreSearch));
        assert_eq!(IntentKind::parse("pricing"), Some(IntentKind::Pricing));
        assert_eq!(IntentKind::parse("weather_report"), None);
    }

    #[test]
    fn coordinates_outside_the_globe_are_rejected() {
        assert!(Coordinates::new(91.0, 0.0).is_none());
        assert!(Coordinates::new(25.0, -181.0).is_none());
    }
}
