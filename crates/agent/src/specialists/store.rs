use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use poolchat_core::domain::catalog::{Store, StoreSearchResult};
use poolchat_core::domain::fragment::FragmentPayload;
use poolchat_core::domain::intent::{Coordinates, Intent, IntentKind, DEFAULT_RADIUS_MILES};
use poolchat_core::errors::SpecialistError;
use serde::Deserialize;

use crate::llm::LlmClient;
use crate::prompts;
use crate::specialists::{Geocoder, Specialist, StoreDirectory};

const STORE_PAGE_SIZE: u32 = 10;

pub const MISSING_LOCATION: &str = "To find stores near you, please tell me your city or zip \
code, for example \"stores near Tampa\" or \"stores near 33602\".";
pub const UNKNOWN_PLACE: &str = "I couldn't find that location. Could you give me a nearby \
city or a 5-digit zip code instead?";
pub const MISSING_STORE_ID: &str =
    "Which store do you mean? A branch number or the city it is in works.";

pub struct StoreSpecialist {
    stores: Arc<dyn StoreDirectory>,
    geocoder: Arc<dyn Geocoder>,
}

impl StoreSpecialist {
    pub fn new(stores: Arc<dyn StoreDirectory>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { stores, geocoder }
    }

    async fn search(&self, intent: &Intent) -> Result<FragmentPayload, SpecialistError> {
        let slots = &intent.slots;
        let at = match (slots.coordinates, slots.location.as_deref()) {
            (Some(coordinates), _) => coordinates,
            (None, Some(location)) => match self.geocoder.geocode(location).await? {
                Some(coordinates) => coordinates,
                None => {
                    tracing::info!(
                        event_name = "specialist.store.location_unknown",
                        location,
                        "geocoder did not recognize location"
                    );
                    return Ok(FragmentPayload::Clarification(UNKNOWN_PLACE.to_string()));
                }
            },
            (None, None) => {
                return Ok(FragmentPayload::Clarification(MISSING_LOCATION.to_string()));
            }
        };

        let radius = slots.radius_miles.unwrap_or(DEFAULT_RADIUS_MILES);
        let page = slots.page.unwrap_or(1);
        let mut result = self.stores.search(at, radius, page, STORE_PAGE_SIZE).await?;
        sort_by_distance(&mut result);
        Ok(FragmentPayload::StoreList(result))
    }
}

/// Nearest first. Stores without a distance go last, in upstream order.
pub fn sort_by_distance(result: &mut StoreSearchResult) {
    result.stores.sort_by(|left: &Store, right: &Store| {
        match (left.distance_miles, right.distance_miles) {
            (Some(left), Some(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

#[async_trait]
impl Specialist for StoreSpecialist {
    fn name(&self) -> &'static str {
        "store"
    }

    fn handles(&self) -> &'static [IntentKind] {
        &[IntentKind::StoreSearch, IntentKind::StoreDetail]
    }

    async fn handle(&self, intent: &Intent) -> Result<FragmentPayload, SpecialistError> {
        match intent.kind {
            IntentKind::StoreSearch => self.search(intent).await,
            IntentKind::StoreDetail => match intent.slots.store_id.as_deref() {
                Some(store_id) => Ok(FragmentPayload::StoreDetail(self.stores.detail(store_id).await?)),
                None => Ok(FragmentPayload::Clarification(MISSING_STORE_ID.to_string())),
            },
            other => Err(SpecialistError::BadRequest(format!(
                "store specialist cannot handle {other}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeAnswer {
    latitude: f64,
    longitude: f64,
}

/// Resolves place names through the language model.
pub struct LlmGeocoder {
    llm: Arc<dyn LlmClient>,
}

impl LlmGeocoder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Geocoder for LlmGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, SpecialistError> {
        let raw = self
            .llm
            .complete(&prompts::geocode(location))
            .await
            .map_err(|error| SpecialistError::Unavailable(format!("geocoder: {error}")))?;
        parse_geocode(&raw)
    }
}

pub fn parse_geocode(raw: &str) -> Result<Option<Coordinates>, SpecialistError> {
    let answer = prompts::strip_code_fence(raw);
    if answer.trim_matches(|c: char| c == '"' || c == '.').eq_ignore_ascii_case(prompts::UNKNOWN_LOCATION)
    {
        return Ok(None);
    }
    let parsed: GeocodeAnswer = serde_json::from_str(answer)
        .map_err(|error| SpecialistError::InvalidResponse(format!("geocoder answer: {error}")))?;
    Coordinates::new(parsed.latitude, parsed.longitude)
        .map(Some)
        .ok_or_else(|| SpecialistError::InvalidResponse("geocoder coordinates out of range".to_owned()))
}
