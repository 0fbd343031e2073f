use std::sync::Arc;

use async_trait::async_trait;
use poolchat_core::domain::fragment::FragmentPayload;
use poolchat_core::domain::intent::{Intent, IntentKind};
use poolchat_core::errors::SpecialistError;

use crate::specialists::{PricingService, Specialist};

pub const MISSING_ITEM_CODE: &str = "I need a product part number to provide pricing \
information. Could you please specify which product you're interested in?";

pub struct PricingSpecialist {
    service: Arc<dyn PricingService>,
}

impl PricingSpecialist {
    pub fn new(service: Arc<dyn PricingService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Specialist for PricingSpecialist {
    fn name(&self) -> &'static str {
        "pricing"
    }

    fn handles(&self) -> &'static [IntentKind] {
        &[IntentKind::Pricing]
    }

    async fn handle(&self, intent: &Intent) -> Result<FragmentPayload, SpecialistError> {
        let items = &intent.slots.items;
        if items.is_empty() {
            return Ok(FragmentPayload::Clarification(MISSING_ITEM_CODE.to_string()));
        }

        let quotes = self.service.price(items).await?;
        if quotes.is_empty() {
            let codes = items.iter().map(|item| item.item_code.as_str()).collect::<Vec<_>>();
            return Err(SpecialistError::NotFound(format!("no prices for {}", codes.join(", "))));
        }

        tracing::debug!(
            event_name = "specialist.pricing.quoted",
            requested = items.len(),
            quoted = quotes.len(),
            "pricing batch answered"
        );
        Ok(FragmentPayload::Prices(quotes))
    }
}
