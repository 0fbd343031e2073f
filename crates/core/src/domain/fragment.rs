use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PriceQuote, ProductRecord, ProductSearchResult, Store, StoreSearchResult};
use crate::domain::intent::{Intent, IntentKind};

pub const REFUSAL_TEXT: &str = "I can only help with pool equipment, parts, pricing, and store \
locations. Please ask me something about pools or pool equipment.";

pub const ALL_FAILED_APOLOGY: &str = "I'm sorry, I couldn't reach our product, pricing, or \
store systems just now. Please try again in a few minutes.";

pub const HELP_NOTICE: &str = "I'm not sure what you're looking for. I can search pool \
equipment, look up a part number, check pricing and stock, find a store near you, or answer \
pool maintenance questions.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Unavailable,
    BadRequest,
    NotFound,
    InvalidResponse,
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::InvalidResponse => "invalid_response",
            Self::Panicked => "panicked",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentStatus {
    Succeeded,
    Failed(FailureKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentSource {
    Cache,
    Specialist,
}

/// Where a fragment came from. Plan fragments point at exactly one plan entry; only the
/// refusal, help and all-failed apology fragments are produced by the coordinator itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentOrigin {
    Plan { index: usize, source: FragmentSource },
    Coordinator,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FragmentPayload {
    ProductList(ProductSearchResult),
    ProductDetail(ProductRecord),
    Prices(Vec<PriceQuote>),
    StoreList(StoreSearchResult),
    StoreDetail(Store),
    Advisory(String),
    Clarification(String),
    Refusal(String),
    Apology(String),
    Empty,
}

impl FragmentPayload {
    /// Only data-carrying answers are worth caching.
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self,
            Self::ProductList(_)
                | Self::ProductDetail(_)
                | Self::Prices(_)
                | Self::StoreList(_)
                | Self::StoreDetail(_)
                | Self::Advisory(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub intent: Intent,
    pub origin: FragmentOrigin,
    pub status: FragmentStatus,
    pub payload: FragmentPayload,
}

impl Fragment {
    pub fn succeeded(intent: Intent, index: usize, payload: FragmentPayload) -> Self {
        Self {
            intent,
            origin: FragmentOrigin::Plan { index, source: FragmentSource::Specialist },
            status: FragmentStatus::Succeeded,
            payload,
        }
    }

    pub fn failed(intent: Intent, index: usize, kind: FailureKind) -> Self {
        Self {
            intent,
            origin: FragmentOrigin::Plan { index, source: FragmentSource::Specialist },
            status: FragmentStatus::Failed(kind),
            payload: FragmentPayload::Empty,
        }
    }

    pub fn refusal() -> Self {
        Self::from_coordinator(FragmentPayload::Refusal(REFUSAL_TEXT.to_string()))
    }

    pub fn help_notice() -> Self {
        Self::from_coordinator(FragmentPayload::Clarification(HELP_NOTICE.to_string()))
    }

    pub fn apology(message: impl Into<String>) -> Self {
        Self::from_coordinator(FragmentPayload::Apology(message.into()))
    }

    fn from_coordinator(payload: FragmentPayload) -> Self {
        Self {
            intent: Intent::new(IntentKind::Unknown, Default::default(), 0.0),
            origin: FragmentOrigin::Coordinator,
            status: FragmentStatus::Succeeded,
            payload,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FragmentStatus::Succeeded
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self.status {
            FragmentStatus::Failed(kind) => Some(kind),
            FragmentStatus::Succeeded => None,
        }
    }

    pub fn plan_index(&self) -> Option<usize> {
        match self.origin {
            FragmentOrigin::Plan { index, .. } => Some(index),
            FragmentOrigin::Coordinator => None,
        }
    }

    pub fn is_cacheable(&self) -> bool {
        self.is_success() && self.payload.is_cacheable()
    }

    /// Re-homes a cached fragment onto the plan entry that requested it.
    pub fn served_from_cache(mut self, index: usize) -> Self {
        self.origin = FragmentOrigin::Plan { index, source: FragmentSource::Cache };
        self
    }

    pub fn with_plan_index(mut self, index: usize) -> Self {
        if let FragmentOrigin::Plan { source, .. } = self.origin {
            self.origin = FragmentOrigin::Plan { index, source };
        }
        self
    }
}
