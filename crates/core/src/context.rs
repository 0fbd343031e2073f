use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::domain::fragment::{Fragment, FragmentPayload};
use crate::domain::intent::{Coordinates, DispatchPlan, IntentKind};
use crate::domain::query::SessionId;

#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    pub text: String,
    pub intents: Vec<IntentKind>,
}

/// Rolling per-session memory used to resolve references like "it" or "that store".
#[derive(Clone, Debug)]
pub struct ConversationContext {
    session_id: SessionId,
    turns: VecDeque<Turn>,
    max_turns: usize,
    last_activity: Instant,
    pub last_part_number: Option<String>,
    pub last_search_term: Option<String>,
    pub last_store_id: Option<String>,
    pub last_coordinates: Option<Coordinates>,
    pub last_location: Option<String>,
}

impl ConversationContext {
    pub fn new(session_id: SessionId, max_turns: usize) -> Self {
        Self {
            session_id,
            turns: VecDeque::with_capacity(max_turns),
            max_turns: max_turns.max(1),
            last_activity: Instant::now(),
            last_part_number: None,
            last_search_term: None,
            last_store_id: None,
            last_coordinates: None,
            last_location: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn has_history(&self) -> bool {
        !self.turns.is_empty()
    }

    pub fn last_intents(&self) -> &[IntentKind] {
        self.turns.back().map(|turn| turn.intents.as_slice()).unwrap_or(&[])
    }

    pub fn is_idle(&self, window: Duration) -> bool {
        Instant::now().duration_since(self.last_activity) >= window
    }

    /// Records a finished turn: the plan that ran and whatever the fragments revealed.
    pub fn record(&mut self, text: &str, plan: &DispatchPlan, fragments: &[Fragment]) {
        for intent in plan.entries() {
            let slots = &intent.slots;
            if let Some(part_number) = &slots.part_number {
                self.last_part_number = Some(part_number.clone());
            }
            if let Some(item) = slots.items.last() {
                self.last_part_number = Some(item.item_code.clone());
            }
            // Advisory entries carry the whole question as their term.
            if intent.kind == IntentKind::ProductSearch {
                if let Some(term) = &slots.search_term {
                    self.last_search_term = Some(term.clone());
                }
            }
            if let Some(store_id) = &slots.store_id {
                self.last_store_id = Some(store_id.clone());
            }
            if let Some(coordinates) = slots.coordinates {
                self.last_coordinates = Some(coordinates);
            }
            if let Some(location) = &slots.location {
                self.last_location = Some(location.clone());
            }
        }

        for fragment in fragments.iter().filter(|fragment| fragment.is_success()) {
            match &fragment.payload {
                FragmentPayload::ProductDetail(record) if !record.part_number.is_empty() => {
                    self.last_part_number = Some(record.part_number.clone());
                }
                FragmentPayload::ProductList(result) if result.products.len() == 1 => {
                    self.last_part_number = Some(result.products[0].part_number.clone());
                }
                FragmentPayload::StoreDetail(store) => {
                    self.last_store_id = Some(store.store_id.clone());
                }
                FragmentPayload::StoreList(result) => {
                    if let Some(nearest) = result.stores.first() {
                        self.last_store_id = Some(nearest.store_id.clone());
                    }
                }
                _ => {}
            }
        }

        if self.turns.len() == self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn { text: text.to_string(), intents: plan.kinds() });
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.session_id.clone(), self.max_turns);
    }

    /// Nothing recorded and nothing remembered.
    pub fn is_blank(&self) -> bool {
        self.turns.is_empty()
            && self.last_part_number.is_none()
            && self.last_search_term.is_none()
            && self.last_store_id.is_none()
            && self.last_coordinates.is_none()
            && self.last_location.is_none()
    }
}

/// Per-session contexts. Each session has its own lock so one session's request never
/// blocks another's.
pub struct ContextStore {
    sessions: Mutex<HashMap<SessionId, Arc<AsyncMutex<ConversationContext>>>>,
    max_turns: usize,
    idle_window: Duration,
}

impl ContextStore {
    pub fn new(max_turns: usize, idle_window: Duration) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), max_turns, idle_window }
    }

    /// Locks the session's context for the duration of one request, creating it on first
    /// use and resetting it when the session has been idle past the window.
    pub async fn acquire(&self, session_id: &SessionId) -> OwnedMutexGuard<ConversationContext> {
        let slot = {
            let mut sessions = self.lock_sessions();
            sessions
                .entry(session_id.clone())
                .or_insert_with(|| {
                    Arc::new(AsyncMutex::new(ConversationContext::new(
                        session_id.clone(),
                        self.max_turns,
                    )))
                })
                .clone()
        };

        let mut context = slot.lock_owned().await;
        if context.has_history() && context.is_idle(self.idle_window) {
            tracing::debug!(
                event_name = "orchestration.context.expired",
                session_id = %session_id,
                "conversation context expired after inactivity"
            );
            context.reset();
        }
        context
    }

    /// Forgets what a session remembered. Returns whether there was anything to forget.
    ///
    /// The reset happens under the session lock, so it waits for a request already in flight
    /// and wipes what that request records.
    pub async fn clear(&self, session_id: &SessionId) -> bool {
        let slot = self.lock_sessions().get(session_id).cloned();
        let Some(slot) = slot else {
            return false;
        };
        let mut context = slot.lock_owned().await;
        let had_state = !context.is_blank();
        context.reset();
        had_state
    }

    /// Drops sessions idle past the window that are not currently in use.
    pub fn prune_expired(&self) -> usize {
        let mut sessions = self.lock_sessions();
        let before = sessions.len();
        sessions.retain(|_, slot| match slot.try_lock() {
            Ok(context) => !context.is_idle(self.idle_window),
            Err(_) => true,
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_sessions(
        &self,
    ) -> MutexGuard<'_, HashMap<SessionId, Arc<AsyncMutex<ConversationContext>>>> {
        match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
