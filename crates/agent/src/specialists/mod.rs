//! Specialist dispatchers and the collaborator contracts they call.
//!
//! Each specialist turns one intent into a payload. The registry wraps every call with a
//! timeout and a panic guard, so a specialist can only ever produce a fragment, never a fault.

pub mod advisory;
pub mod pricing;
pub mod product;
pub mod store;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use poolchat_core::domain::catalog::{
    PriceQuote, ProductRecord, ProductSearchResult, Store, StoreSearchResult,
};
use poolchat_core::domain::fragment::{FailureKind, Fragment, FragmentPayload};
use poolchat_core::domain::intent::{Coordinates, Intent, IntentKind, PricingItem};
use poolchat_core::errors::{OrchestrationError, SpecialistError};

use crate::llm::LlmClient;

pub use advisory::AdvisorySpecialist;
pub use pricing::PricingSpecialist;
pub use product::ProductSpecialist;
pub use store::{LlmGeocoder, StoreSpecialist};

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn search(
        &self,
        term: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ProductSearchResult, SpecialistError>;
    async fn semantic_search(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<ProductSearchResult, SpecialistError>;
    async fn detail(&self, part_number: &str) -> Result<ProductRecord, SpecialistError>;
}

#[async_trait]
pub trait PricingService: Send + Sync {
    /// Prices the whole batch in a single upstream call.
    async fn price(&self, items: &[PricingItem]) -> Result<Vec<PriceQuote>, SpecialistError>;
}

#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn search(
        &self,
        at: Coordinates,
        radius_miles: u32,
        page: u32,
        page_size: u32,
    ) -> Result<StoreSearchResult, SpecialistError>;
    async fn detail(&self, store_id: &str) -> Result<Store, SpecialistError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the place was understood to be unknown.
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, SpecialistError>;
}

#[async_trait]
pub trait Specialist: Send + Sync {
    fn name(&self) -> &'static str;
    fn handles(&self) -> &'static [IntentKind];
    async fn handle(&self, intent: &Intent) -> Result<FragmentPayload, SpecialistError>;
}

#[derive(Default)]
pub struct SpecialistRegistry {
    specialists: HashMap<IntentKind, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    /// The four standard specialists over the given collaborators.
    pub fn standard(
        catalog: Arc<dyn ProductCatalog>,
        pricing: Arc<dyn PricingService>,
        stores: Arc<dyn StoreDirectory>,
        geocoder: Arc<dyn Geocoder>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let mut registry = Self::default();
        registry.register(ProductSpecialist::new(catalog));
        registry.register(PricingSpecialist::new(pricing));
        registry.register(StoreSpecialist::new(stores, geocoder));
        registry.register(AdvisorySpecialist::new(llm));
        registry
    }

    pub fn register<S>(&mut self, specialist: S)
    where
        S: Specialist + 'static,
    {
        let specialist: Arc<dyn Specialist> = Arc::new(specialist);
        for kind in specialist.handles() {
            self.specialists.insert(*kind, Arc::clone(&specialist));
        }
    }

    pub fn get(&self, kind: IntentKind) -> Option<&Arc<dyn Specialist>> {
        self.specialists.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }

    /// Runs the specialist for plan entry `index`. Always returns a fragment for that entry.
    pub async fn dispatch(&self, index: usize, intent: &Intent, timeout: Duration) -> Fragment {
        let Some(specialist) = self.get(intent.kind) else {
            let error = OrchestrationError::SpecialistUnavailable {
                intent: intent.kind,
                reason: "no specialist registered".to_owned(),
            };
            tracing::warn!(event_name = error.event_name(), intent = %intent.kind, "{error}");
            return Fragment::failed(intent.clone(), index, FailureKind::Unavailable);
        };

        let call = AssertUnwindSafe(specialist.handle(intent)).catch_unwind();
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_panic)) => Err(SpecialistError::Panicked),
            Err(_elapsed) => {
                Err(SpecialistError::Timeout { after_ms: whole_millis(timeout) })
            }
        };

        match outcome {
            Ok(payload) => {
                tracing::debug!(
                    event_name = "orchestration.dispatch.completed",
                    specialist = specialist.name(),
                    intent = %intent.kind,
                    plan_index = index,
                    "specialist answered"
                );
                Fragment::succeeded(intent.clone(), index, payload)
            }
            Err(error) => {
                let kind = error.failure_kind();
                let absorbed = OrchestrationError::from_failure(intent.kind, kind);
                tracing::warn!(
                    event_name = absorbed.event_name(),
                    specialist = specialist.name(),
                    intent = %intent.kind,
                    plan_index = index,
                    error = %error,
                    "specialist failed; continuing with remaining fragments"
                );
                Fragment::failed(intent.clone(), index, kind)
            }
        }
    }
}

fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use poolchat_core::domain::fragment::{FailureKind, FragmentPayload};
    use poolchat_core::domain::intent::{Intent, IntentKind, Slots};
    use poolchat_core::errors::SpecialistError;

    use super::{Specialist, SpecialistRegistry};

    struct Sleepy;

    #[async_trait]
    impl Specialist for Sleepy {
        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn handles(&self) -> &'static [IntentKind] {
            &[IntentKind::Advisory]
        }

        async fn handle(&self, _intent: &Intent) -> Result<FragmentPayload, SpecialistError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(FragmentPayload::Advisory("too late".to_owned()))
        }
    }

    struct Explosive;

    #[async_trait]
    impl Specialist for Explosive {
        fn name(&self) -> &'static str {
            "explosive"
        }

        fn handles(&self) -> &'static [IntentKind] {
            &[IntentKind::Pricing]
        }

        async fn handle(&self, _intent: &Intent) -> Result<FragmentPayload, SpecialistError> {
            panic!("upstream client bug");
        }
    }

    fn intent(kind: IntentKind) -> Intent {
        Intent::new(kind, Slots::default().with_search_term("x"), 0.9)
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_failed_fragment() {
        let mut registry = SpecialistRegistry::default();
        registry.register(Sleepy);

        let fragment =
            registry.dispatch(2, &intent(IntentKind::Advisory), Duration::from_millis(100)).await;

        assert_eq!(fragment.failure(), Some(FailureKind::Timeout));
        assert_eq!(fragment.plan_index(), Some(2));
    }

    #[test]
    fn timeout_millis_saturate_instead_of_wrapping() {
        assert_eq!(super::whole_millis(Duration::from_millis(8_000)), 8_000);
        assert_eq!(super::whole_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn panic_becomes_failed_fragment() {
        let mut registry = SpecialistRegistry::default();
        registry.register(Explosive);

        let fragment =
            registry.dispatch(0, &intent(IntentKind::Pricing), Duration::from_secs(1)).await;
        assert_eq!(fragment.failure(), Some(FailureKind::Panicked));
    }

    #[tokio::test]
    async fn missing_specialist_is_unavailable() {
        let registry = SpecialistRegistry::default();
        let fragment =
            registry.dispatch(0, &intent(IntentKind::StoreSearch), Duration::from_secs(1)).await;
        assert_eq!(fragment.failure(), Some(FailureKind::Unavailable));
    }
}
