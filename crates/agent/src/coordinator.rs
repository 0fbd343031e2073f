//! The request state machine: scope check, classification, cached fan-out, fusion.
//!
//! `handle` always produces exactly one reply. Specialist failures become failed fragments,
//! a total failure becomes one apology, and a fault inside the pipeline itself is caught and
//! answered with the same apology.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use poolchat_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use poolchat_core::cache::ResponseCache;
use poolchat_core::config::OrchestrationConfig;
use poolchat_core::context::ContextStore;
use poolchat_core::domain::fragment::{Fragment, FragmentSource, ALL_FAILED_APOLOGY, HELP_NOTICE};
use poolchat_core::domain::intent::DispatchPlan;
use poolchat_core::domain::query::{Query, SessionId};
use poolchat_core::domain::scope::{ScopeSignal, ScopeVerdict};
use poolchat_core::errors::OrchestrationError;
use poolchat_core::flows::{RequestEvent, RequestState, RequestTracker};
use serde::Serialize;
use uuid::Uuid;

use crate::classifier::QueryClassifier;
use crate::fusion::{self, LlmSynthesisFormatter, PlainTextFormatter, ResponseFormatter};
use crate::llm::LlmClient;
use crate::scope::ScopeFilter;
use crate::specialists::SpecialistRegistry;

const ACTOR: &str = "coordinator";

/// The single outbound message for one query, plus the trail that produced it.
#[derive(Clone, Debug, Serialize)]
pub struct Reply {
    pub correlation_id: String,
    pub text: String,
    pub verdict: ScopeVerdict,
    pub plan: DispatchPlan,
    pub fragments: Vec<Fragment>,
    pub states: Vec<RequestState>,
}

pub struct Coordinator {
    scope: ScopeFilter,
    classifier: QueryClassifier,
    registry: Arc<SpecialistRegistry>,
    cache: Arc<ResponseCache>,
    contexts: Arc<ContextStore>,
    formatter: Arc<dyn ResponseFormatter>,
    audit: Arc<dyn AuditSink>,
    dispatch_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        settings: &OrchestrationConfig,
        llm: Arc<dyn LlmClient>,
        registry: SpecialistRegistry,
    ) -> Result<Self, regex::Error> {
        let formatter: Arc<dyn ResponseFormatter> = if settings.llm_synthesis {
            Arc::new(LlmSynthesisFormatter::new(Arc::clone(&llm)))
        } else {
            Arc::new(PlainTextFormatter)
        };

        Ok(Self {
            scope: ScopeFilter::new()?,
            classifier: QueryClassifier::new(llm, settings.confidence_threshold)?,
            registry: Arc::new(registry),
            cache: Arc::new(ResponseCache::new(settings.cache_capacity, settings.ttl.clone())),
            contexts: Arc::new(ContextStore::new(
                settings.context_max_turns,
                settings.context_idle(),
            )),
            formatter,
            audit: Arc::new(TracingAuditSink),
            dispatch_timeout: settings.dispatch_timeout(),
        })
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn ResponseFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn contexts(&self) -> &ContextStore {
        &self.contexts
    }

    /// Forgets everything remembered for the session. Returns whether it had any state.
    pub async fn reset_session(&self, session_id: &SessionId) -> bool {
        let cleared = self.contexts.clear(session_id).await;
        tracing::info!(
            event_name = "orchestration.context.cleared",
            session_id = %session_id,
            cleared,
            "conversation context reset"
        );
        cleared
    }

    pub async fn handle(&self, query: Query) -> Reply {
        let correlation_id = Uuid::new_v4().to_string();
        let outcome = AssertUnwindSafe(self.run(&query, &correlation_id)).catch_unwind().await;

        match outcome {
            Ok(reply) => reply,
            Err(_panic) => {
                tracing::error!(
                    event_name = "orchestration.request.faulted",
                    correlation_id = %correlation_id,
                    session_id = %query.session_id(),
                    "request pipeline panicked; answering with apology"
                );
                let audit = self.audit_context(&query, &correlation_id);
                let mut tracker = RequestTracker::default();
                tracker.fail("pipeline panicked", self.audit.as_ref(), &audit);
                Reply {
                    correlation_id,
                    text: ALL_FAILED_APOLOGY.to_string(),
                    verdict: ScopeVerdict::ambiguous(ScopeSignal::NoSignal),
                    plan: DispatchPlan::unknown(),
                    fragments: vec![Fragment::apology(ALL_FAILED_APOLOGY)],
                    states: tracker.visited().to_vec(),
                }
            }
        }
    }

    async fn run(&self, query: &Query, correlation_id: &str) -> Reply {
        let audit = self.audit_context(query, correlation_id);
        let mut tracker = RequestTracker::default();
        let mut context = self.contexts.acquire(query.session_id()).await;

        let verdict = self.scope.classify_scope(query.text(), &context);
        tracing::info!(
            event_name = "orchestration.scope.evaluated",
            correlation_id,
            session_id = %query.session_id(),
            decision = verdict.decision.as_str(),
            signal = %verdict.signal,
            "scope evaluated"
        );
        self.audit.emit(
            AuditEvent::from_context(&audit, "scope.evaluated", AuditCategory::Scope, AuditOutcome::Success)
                .with_metadata("decision", verdict.decision.as_str())
                .with_metadata("signal", verdict.signal.to_string()),
        );
        self.step(&mut tracker, RequestEvent::ScopeEvaluated, &audit);

        if verdict.is_out_of_scope() {
            let rejection = OrchestrationError::ScopeRejected { signal: verdict.signal.to_string() };
            tracing::info!(
                event_name = rejection.event_name(),
                correlation_id,
                session_id = %query.session_id(),
                "{rejection}"
            );
            self.step(&mut tracker, RequestEvent::ScopeRejected, &audit);
            context.touch();
            let refusal = Fragment::refusal();
            return Reply {
                correlation_id: correlation_id.to_string(),
                text: PlainTextFormatter.render(std::slice::from_ref(&refusal)),
                verdict,
                plan: DispatchPlan::unknown(),
                fragments: vec![refusal],
                states: tracker.visited().to_vec(),
            };
        }

        let plan = self.classifier.classify(query.text(), &verdict, &context).await;
        tracing::info!(
            event_name = "orchestration.classify.completed",
            correlation_id,
            session_id = %query.session_id(),
            intents = ?plan.kinds(),
            "dispatch plan built"
        );
        self.audit.emit(
            AuditEvent::from_context(&audit, "plan.built", AuditCategory::Classification, AuditOutcome::Success)
                .with_metadata("intents", format!("{:?}", plan.kinds())),
        );
        self.step(&mut tracker, RequestEvent::PlanBuilt, &audit);

        if plan.is_unknown() || plan.is_empty() {
            self.step(&mut tracker, RequestEvent::FragmentsCollected, &audit);
            self.step(&mut tracker, RequestEvent::ReplyComposed, &audit);
            context.record(query.text(), &plan, &[]);
            return Reply {
                correlation_id: correlation_id.to_string(),
                text: HELP_NOTICE.to_string(),
                verdict,
                plan,
                fragments: vec![Fragment::help_notice()],
                states: tracker.visited().to_vec(),
            };
        }

        let fully_cached =
            plan.entries().iter().all(|intent| self.cache.contains(&intent.fingerprint()));
        let event =
            if fully_cached { RequestEvent::CacheSatisfied } else { RequestEvent::DispatchStarted };
        self.step(&mut tracker, event, &audit);

        let collected = self.collect(&plan, correlation_id, &audit).await;
        self.step(&mut tracker, RequestEvent::FragmentsCollected, &audit);

        let fused = fusion::fuse(collected.clone());
        let text = self.formatter.format(query, &fused).await;
        self.audit.emit(
            AuditEvent::from_context(&audit, "reply.composed", AuditCategory::Fusion, AuditOutcome::Success)
                .with_metadata("fragments", fused.len().to_string()),
        );
        self.step(&mut tracker, RequestEvent::ReplyComposed, &audit);

        context.record(query.text(), &plan, &collected);

        Reply {
            correlation_id: correlation_id.to_string(),
            text,
            verdict,
            plan,
            fragments: fused,
            states: tracker.visited().to_vec(),
        }
    }

    /// Resolves every plan entry concurrently, cache first.
    async fn collect(
        &self,
        plan: &DispatchPlan,
        correlation_id: &str,
        audit: &AuditContext,
    ) -> Vec<Fragment> {
        let lookups = plan.entries().iter().enumerate().map(|(index, intent)| async move {
            let (fragment, source) = self
                .cache
                .get_or_fetch(intent, || self.registry.dispatch(index, intent, self.dispatch_timeout))
                .await;
            let hit = source == FragmentSource::Cache;
            self.audit.emit(
                AuditEvent::from_context(audit, "cache.lookup", AuditCategory::Cache, AuditOutcome::Success)
                    .with_metadata("fingerprint", intent.fingerprint().to_string())
                    .with_metadata("hit", hit.to_string()),
            );
            if hit {
                tracing::debug!(
                    event_name = "orchestration.cache.hit",
                    correlation_id,
                    intent = %intent.kind,
                    plan_index = index,
                    "served from cache"
                );
                fragment.served_from_cache(index)
            } else {
                fragment.with_plan_index(index)
            }
        });
        let fragments = join_all(lookups).await;

        for fragment in &fragments {
            let outcome =
                if fragment.is_success() { AuditOutcome::Success } else { AuditOutcome::Failed };
            let mut event =
                AuditEvent::from_context(audit, "fragment.collected", AuditCategory::Dispatch, outcome)
                    .with_metadata("intent", fragment.intent.kind.as_str());
            if let Some(kind) = fragment.failure() {
                event = event.with_metadata("failure", kind.as_str());
            }
            self.audit.emit(event);
        }
        fragments
    }

    fn step(&self, tracker: &mut RequestTracker, event: RequestEvent, audit: &AuditContext) {
        if let Err(error) = tracker.advance(event, self.audit.as_ref(), audit) {
            tracing::error!(
                event_name = "orchestration.flow.invalid_transition",
                correlation_id = %audit.correlation_id,
                error = %error,
                "request flow rejected a transition"
            );
            tracker.fail(error.to_string(), self.audit.as_ref(), audit);
        }
    }

    fn audit_context(&self, query: &Query, correlation_id: &str) -> AuditContext {
        AuditContext::new(Some(query.session_id().to_string()), correlation_id, ACTOR)
    }
}
