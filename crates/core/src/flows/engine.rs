use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{RequestAction, RequestEvent, RequestState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> RequestState;
    fn transition(
        &self,
        current: &RequestState,
        event: &RequestEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Lifecycle of one inbound query, from receipt to the single outbound reply.
#[derive(Clone, Debug, Default)]
pub struct RequestFlow;

impl FlowDefinition for RequestFlow {
    fn initial_state(&self) -> RequestState {
        RequestState::Received
    }

    fn transition(
        &self,
        current: &RequestState,
        event: &RequestEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_request(current, event)
    }
}

#[derive(Clone, Debug)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> RequestState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &RequestState,
        event: &RequestEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &RequestState,
        event: &RequestEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<RequestFlow> {
    fn default() -> Self {
        Self::new(RequestFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: RequestState, event: RequestEvent },
    #[error("request already finished; event {event:?} ignored")]
    AlreadyDone { event: RequestEvent },
}

fn transition_request(
    current: &RequestState,
    event: &RequestEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use RequestAction::{
        Classify, DeliverReply, EmitApology, EmitRefusal, FuseFragments, ResolvePlan,
    };
    use RequestEvent::{
        CacheSatisfied, DispatchStarted, Failed, FragmentsCollected, PlanBuilt, ReplyComposed,
        ScopeEvaluated, ScopeRejected,
    };
    use RequestState::{CacheHit, Classified, Dispatching, Done, Fusing, Received, ScopeChecked};

    let (to, actions) = match (current, event) {
        (Done, _) => return Err(FlowTransitionError::AlreadyDone { event: event.clone() }),
        (Received, ScopeEvaluated) => (ScopeChecked, vec![Classify]),
        (ScopeChecked, ScopeRejected) => (Done, vec![EmitRefusal, DeliverReply]),
        (ScopeChecked, PlanBuilt) => (Classified, vec![ResolvePlan]),
        (Classified, CacheSatisfied) => (CacheHit, Vec::new()),
        (Classified, DispatchStarted) => (Dispatching, Vec::new()),
        (Classified, FragmentsCollected)
        | (CacheHit, FragmentsCollected)
        | (Dispatching, FragmentsCollected) => (Fusing, vec![FuseFragments]),
        (Fusing, ReplyComposed) => (Done, vec![DeliverReply]),
        (_, Failed { .. }) => (Done, vec![EmitApology, DeliverReply]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

/// Walks one request through the flow and keeps the visited states.
#[derive(Clone, Debug)]
pub struct RequestTracker {
    engine: FlowEngine<RequestFlow>,
    state: RequestState,
    visited: Vec<RequestState>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        let engine = FlowEngine::default();
        let state = engine.initial_state();
        Self { engine, state, visited: vec![state] }
    }
}

impl RequestTracker {
    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn visited(&self) -> &[RequestState] {
        &self.visited
    }

    pub fn advance<S>(
        &mut self,
        event: RequestEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let outcome = self.engine.apply_with_audit(&self.state, &event, sink, audit)?;
        self.state = outcome.to;
        self.visited.push(outcome.to);
        Ok(outcome)
    }

    /// Forces the request to `Done`. A no-op when it already finished.
    pub fn fail<S>(&mut self, reason: impl Into<String>, sink: &S, audit: &AuditContext)
    where
        S: AuditSink + ?Sized,
    {
        if self.state.is_terminal() {
            return;
        }
        let event = RequestEvent::Failed { reason: reason.into() };
        if self.advance(event, sink, audit).is_err() {
            self.state = RequestState::Done;
            self.visited.push(RequestState::Done);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::flows::engine::{FlowEngine, FlowTransitionError, RequestTracker};
    use crate::flows::states::{RequestAction, RequestEvent, RequestState};

    fn audit() -> AuditContext {
        AuditContext::new(Some("chat-42".to_owned()), "req-42", "coordinator")
    }

    #[test]
    fn dispatch_path_reaches_done() {
        let engine = FlowEngine::default();
        let mut state = engine.initial_state();

        for event in [
            RequestEvent::ScopeEvaluated,
            RequestEvent::PlanBuilt,
            RequestEvent::DispatchStarted,
            RequestEvent::FragmentsCollected,
        ] {
            state = engine.apply(&state, &event).expect("valid transition").to;
        }
        assert_eq!(state, RequestState::Fusing);

        let done = engine.apply(&state, &RequestEvent::ReplyComposed).expect("fusing -> done");
        assert_eq!(done.to, RequestState::Done);
        assert_eq!(done.actions, vec![RequestAction::DeliverReply]);
    }

    #[test]
    fn scope_rejection_skips_classification() {
        let engine = FlowEngine::default();
        let checked = engine
            .apply(&RequestState::Received, &RequestEvent::ScopeEvaluated)
            .expect("received -> scope checked")
            .to;
        let rejected =
            engine.apply(&checked, &RequestEvent::ScopeRejected).expect("scope checked -> done");

        assert_eq!(rejected.to, RequestState::Done);
        assert!(rejected.actions.contains(&RequestAction::EmitRefusal));
    }

    #[test]
    fn failure_from_any_live_state_lands_on_done() {
        let engine = FlowEngine::default();
        for state in [
            RequestState::Received,
            RequestState::ScopeChecked,
            RequestState::Classified,
            RequestState::CacheHit,
            RequestState::Dispatching,
            RequestState::Fusing,
        ] {
            let outcome = engine
                .apply(&state, &RequestEvent::Failed { reason: "boom".to_owned() })
                .expect("failure is always accepted");
            assert_eq!(outcome.to, RequestState::Done);
            assert!(outcome.actions.contains(&RequestAction::EmitApology));
        }
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&RequestState::Received, &RequestEvent::DispatchStarted)
            .expect_err("cannot dispatch before scope check");

        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                state: RequestState::Received,
                event: RequestEvent::DispatchStarted
            }
        ));
    }

    #[test]
    fn done_accepts_no_further_events() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&RequestState::Done, &RequestEvent::Failed { reason: "late".to_owned() })
            .expect_err("done is terminal");
        assert!(matches!(error, FlowTransitionError::AlreadyDone { .. }));
    }

    #[test]
    fn tracker_records_states_and_audits_transitions() {
        let sink = InMemoryAuditSink::default();
        let mut tracker = RequestTracker::default();

        tracker.advance(RequestEvent::ScopeEvaluated, &sink, &audit()).expect("scope");
        tracker.advance(RequestEvent::PlanBuilt, &sink, &audit()).expect("classify");
        tracker.fail("dispatch panicked", &sink, &audit());
        tracker.fail("second failure is ignored", &sink, &audit());

        assert_eq!(
            tracker.visited(),
            &[
                RequestState::Received,
                RequestState::ScopeChecked,
                RequestState::Classified,
                RequestState::Done
            ]
        );
        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].session_id.as_deref(), Some("chat-42"));
        assert_eq!(events[2].event_type, "flow.transition_applied");
    }
}
