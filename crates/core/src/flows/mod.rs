pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, RequestFlow, RequestTracker};
pub use states::{RequestAction, RequestEvent, RequestState, TransitionOutcome};
