pub mod audit;
pub mod cache;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod flows;

pub use cache::{CacheStats, ResponseCache};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use context::{ContextStore, ConversationContext};
pub use domain::catalog::{
    PriceQuote, ProductRecord, ProductSearchResult, ProductSummary, Store, StoreSearchResult,
};
pub use domain::fragment::{
    FailureKind, Fragment, FragmentOrigin, FragmentPayload, FragmentSource, FragmentStatus,
};
pub use domain::intent::{
    Coordinates, DispatchPlan, Fingerprint, Intent, IntentKind, PricingItem, SlotName, Slots,
};
pub use domain::query::{Query, SessionId};
pub use domain::scope::{ScopeDecision, ScopeSignal, ScopeVerdict};
pub use errors::{ApplicationError, InterfaceError, OrchestrationError, SpecialistError};
