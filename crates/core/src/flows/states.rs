use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Received,
    ScopeChecked,
    Classified,
    CacheHit,
    Dispatching,
    Fusing,
    Done,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    ScopeEvaluated,
    ScopeRejected,
    PlanBuilt,
    CacheSatisfied,
    DispatchStarted,
    FragmentsCollected,
    ReplyComposed,
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestAction {
    Classify,
    ResolvePlan,
    FuseFragments,
    EmitRefusal,
    EmitApology,
    DeliverReply,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestState,
    pub to: RequestState,
    pub event: RequestEvent,
    pub actions: Vec<RequestAction>,
}
