//! Conversation context — per-session turn history and slot filling.
//!
//! Each session owns one `ConversationContext`: a capped queue of recent
//! turns. Unbound required slots are filled from the most recent entity of
//! the same kind. The `ContextStore` hands out per-session handles; the
//! global map is locked only for lookup, and the per-session async mutex
//! serializes turns of one session in arrival order. A turn holds that mutex
//! from start to finish, so only a close can invalidate it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pc_protocol::{Entity, EntityKind, IntentCandidate, Utterance};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;

use crate::preprocess::Preprocessed;

/// Words that refer back to an earlier turn.
const ANAPHORA: &[&str] = &["it", "its", "it's", "that", "this", "same", "them", "those"];

// ── Turn ────────────────────────────────────────────────────────

/// One resolved (or clarification-pending) turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub utterance: Utterance,
    /// The intent acted on, or left pending. `None` for unresolved turns.
    pub candidate: Option<IntentCandidate>,
    /// Entities found in, or inferred for, this turn.
    pub entities: Vec<Entity>,
    /// Whether `candidate` still awaits missing slots.
    pub pending: bool,
}

impl Turn {
    pub fn new(
        utterance: Utterance,
        candidate: Option<IntentCandidate>,
        entities: Vec<Entity>,
        pending: bool,
    ) -> Self {
        Self {
            utterance,
            candidate,
            entities,
            pending,
        }
    }
}

// ── Conversation Context ────────────────────────────────────────

/// Bounded history of one conversation.
#[derive(Debug)]
pub struct ConversationContext {
    session_id: String,
    turns: VecDeque<Turn>,
    capacity: usize,
    last_active: Instant,
}

impl ConversationContext {
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            session_id: session_id.into(),
            turns: VecDeque::with_capacity(capacity),
            capacity,
            last_active: Instant::now(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// Name of the most recent intent that was acted on.
    pub fn last_intent(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .filter(|t| !t.pending)
            .find_map(|t| t.candidate.as_ref())
            .map(|c| c.name.as_str())
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Append a turn, dropping the oldest one when full.
    pub fn push(&mut self, turn: Turn) {
        if self.turns.len() == self.capacity
            && let Some(evicted) = self.turns.pop_front()
        {
            tracing::debug!(
                session_id = %self.session_id,
                evicted_at = %evicted.utterance.received_at,
                capacity = self.capacity,
                "context full, oldest turn evicted"
            );
        }
        self.turns.push_back(turn);
        self.touch();
    }

    /// Most recent entity of `kind`, newest turn first and, within a turn,
    /// the last mention first.
    pub fn latest_entity(&self, kind: EntityKind) -> Option<&Entity> {
        self.turns
            .iter()
            .rev()
            .flat_map(|t| t.entities.iter().rev())
            .find(|e| e.kind == kind)
    }

    /// Fill unbound required slots from history. Returns the kinds filled.
    pub fn fill(&self, candidate: &mut IntentCandidate) -> Vec<EntityKind> {
        let mut filled = Vec::new();
        for kind in candidate.missing_slots() {
            if let Some(previous) = self.latest_entity(kind)
                && candidate.bind(Entity::inferred_from(previous))
            {
                filled.push(kind);
            }
        }
        if !filled.is_empty() {
            tracing::debug!(
                session_id = %self.session_id,
                intent = %candidate.name,
                filled = ?filled,
                "slots filled from context"
            );
        }
        filled
    }

    /// The previous turn's intent, if it stopped for missing slots.
    pub fn pending(&self) -> Option<&IntentCandidate> {
        self.turns
            .back()
            .filter(|t| t.pending)
            .and_then(|t| t.candidate.as_ref())
    }

    /// Resume a pending intent with this turn's entities, provided they
    /// supply at least one of its missing kinds.
    pub fn resume_pending(&self, entities: &[Entity]) -> Option<IntentCandidate> {
        let pending = self.pending()?;
        let missing = pending.missing_slots();
        if !entities.iter().any(|e| missing.contains(&e.kind)) {
            return None;
        }
        let mut resumed = pending.clone();
        for entity in entities.iter().filter(|e| missing.contains(&e.kind)) {
            resumed.bind(entity.clone());
        }
        tracing::debug!(
            session_id = %self.session_id,
            intent = %resumed.name,
            "pending clarification resumed"
        );
        Some(resumed)
    }
}

/// Whether the utterance refers back to an earlier turn.
pub fn has_anaphora(input: &Preprocessed) -> bool {
    input
        .tokens
        .iter()
        .any(|t| ANAPHORA.contains(&t.lemma.as_str()))
}

// ── Session Store ───────────────────────────────────────────────

/// One live conversation: its context plus a token that is cancelled when
/// the session is closed.
#[derive(Debug)]
pub struct Session {
    id: String,
    context: Arc<Mutex<ConversationContext>>,
    cancel: CancellationToken,
}

impl Session {
    fn new(id: &str, capacity: usize) -> Self {
        Self {
            id: id.to_string(),
            context: Arc::new(Mutex::new(ConversationContext::new(id, capacity))),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for exclusive access. Turns of one session queue here in
    /// arrival order.
    pub async fn lock(&self) -> MutexGuard<'_, ConversationContext> {
        self.context.lock().await
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Map of session id → session, with idle-time eviction.
#[derive(Debug)]
pub struct ContextStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    capacity: usize,
    ttl: Duration,
}

impl ContextStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    /// Handle for `session_id`, created on first use.
    pub async fn session(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id, "session created");
            Arc::new(Session::new(session_id, self.capacity))
        });
        Arc::clone(session)
    }

    /// Handle for `session_id` together with its locked context. A handle
    /// closed or evicted while waiting for the lock is discarded and the
    /// lookup retried, so the turn always runs on a live session.
    pub async fn checkout(
        &self,
        session_id: &str,
    ) -> (Arc<Session>, OwnedMutexGuard<ConversationContext>) {
        loop {
            let session = self.session(session_id).await;
            let ctx = Arc::clone(&session.context).lock_owned().await;
            if !session.is_closed() {
                return (session, ctx);
            }
            tracing::debug!(session_id, "session dropped while waiting, retrying");
        }
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove a session and cancel its in-flight turns. Returns whether the
    /// session existed.
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);
        match removed {
            Some(session) => {
                session.cancel.cancel();
                tracing::info!(session_id, "session closed");
                true
            }
            None => false,
        }
    }

    /// Drop sessions idle longer than the TTL. Sessions with a turn in
    /// progress are never idle. Returns the number evicted.
    pub async fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| {
                s.context
                    .try_lock()
                    .is_ok_and(|ctx| ctx.idle_for() >= self.ttl)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.cancel.cancel();
            }
        }
        if !expired.is_empty() {
            tracing::info!(evicted = expired.len(), "idle sessions evicted");
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;
    use pc_protocol::{EntityValue, ResourceSpec, Span};

    fn vm(id: u32) -> Entity {
        Entity::explicit(EntityKind::VmId, EntityValue::Id(id), Some(Span::new(0, 3)))
    }

    fn turn(text: &str, entities: Vec<Entity>) -> Turn {
        Turn::new(Utterance::new(text, "tester"), None, entities, false)
    }

    fn resize() -> IntentCandidate {
        IntentCandidate::new(
            "vm_resize",
            0.85,
            vec![EntityKind::VmId, EntityKind::ResourceSpec],
            vec![],
        )
    }

    #[test]
    fn fill_uses_most_recent_entity() {
        let mut ctx = ConversationContext::new("s1", 10);
        ctx.push(turn("status of vm 100", vec![vm(100)]));
        ctx.push(turn("status of vm 101", vec![vm(101)]));

        let mut candidate = resize();
        let filled = ctx.fill(&mut candidate);
        assert_eq!(filled, vec![EntityKind::VmId]);

        let bound = candidate.bound(EntityKind::VmId).unwrap();
        assert_eq!(bound.value, EntityValue::Id(101));
        assert_eq!(bound.source, pc_protocol::EntitySource::InferredFromContext);
        assert!(bound.span.is_none());
        assert_eq!(candidate.missing_slots(), vec![EntityKind::ResourceSpec]);
    }

    #[test]
    fn fill_never_overrides_bound_slots() {
        let mut ctx = ConversationContext::new("s1", 10);
        ctx.push(turn("status of vm 100", vec![vm(100)]));
        let mut candidate = resize();
        candidate.bind(vm(200));
        assert!(ctx.fill(&mut candidate).is_empty());
        assert_eq!(
            candidate.bound(EntityKind::VmId).unwrap().value,
            EntityValue::Id(200)
        );
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut ctx = ConversationContext::new("s1", 3);
        ctx.push(turn("status of vm 100", vec![vm(100)]));
        for _ in 0..3 {
            ctx.push(turn("list vms", vec![]));
        }
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.turns().next().unwrap().utterance.text, "list vms");
        assert!(ctx.latest_entity(EntityKind::VmId).is_none());
    }

    #[test]
    fn pending_intent_resumes_with_missing_kind() {
        let mut ctx = ConversationContext::new("s1", 10);
        let mut pending = resize();
        pending.bind(vm(100));
        ctx.push(Turn::new(
            Utterance::new("resize vm 100", "tester"),
            Some(pending),
            vec![vm(100)],
            true,
        ));
        assert_eq!(ctx.pending().unwrap().name, "vm_resize");
        assert!(ctx.last_intent().is_none());

        let spec = Entity::explicit(
            EntityKind::ResourceSpec,
            EntityValue::Resources(ResourceSpec {
                memory_mb: Some(4096),
                ..Default::default()
            }),
            Some(Span::new(0, 7)),
        );
        let resumed = ctx.resume_pending(&[spec]).unwrap();
        assert!(resumed.is_fully_bound());

        // Entities of unrelated kinds do not resume it.
        let path = Entity::explicit(EntityKind::Path, EntityValue::Path("/mnt".into()), None);
        assert!(ctx.resume_pending(&[path]).is_none());
    }

    #[test]
    fn anaphora_markers() {
        assert!(has_anaphora(&preprocess("increase its memory")));
        assert!(has_anaphora(&preprocess("restart that one")));
        assert!(!has_anaphora(&preprocess("restart vm 100")));
    }

    #[tokio::test]
    async fn store_reuses_sessions() {
        let store = ContextStore::new(10, Duration::from_secs(60));
        let a = store.session("alice").await;
        let b = store.session("alice").await;
        assert!(Arc::ptr_eq(&a, &b));
        store.session("bob").await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn close_cancels_and_forgets() {
        let store = ContextStore::new(10, Duration::from_secs(60));
        let session = store.session("alice").await;
        assert!(store.close("alice").await);
        assert!(session.is_closed());
        assert!(!store.contains("alice").await);
        assert!(!store.close("alice").await);

        let fresh = store.session("alice").await;
        assert!(!fresh.is_closed());
        assert!(fresh.lock().await.is_empty());
    }

    #[tokio::test]
    async fn checkout_skips_session_dropped_while_waiting() {
        let store = Arc::new(ContextStore::new(10, Duration::from_secs(60)));
        let stale = store.session("alice").await;
        let guard = stale.lock().await;

        let waiting = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let (session, ctx) = store.checkout("alice").await;
                (session.is_closed(), ctx.is_empty())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.close("alice").await);
        drop(guard);

        let (closed, empty) = waiting.await.unwrap();
        assert!(!closed);
        assert!(empty);
        assert!(store.contains("alice").await);
        assert!(!Arc::ptr_eq(&stale, &store.session("alice").await));
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let store = ContextStore::new(10, Duration::ZERO);
        store.session("alice").await;
        store.session("bob").await;
        assert_eq!(store.evict_expired().await, 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn busy_sessions_survive_eviction() {
        let store = ContextStore::new(10, Duration::ZERO);
        let session = store.session("alice").await;
        let _guard = session.lock().await;
        assert_eq!(store.evict_expired().await, 0);
        assert!(store.contains("alice").await);
    }

    #[tokio::test]
    async fn fresh_sessions_are_kept() {
        let store = ContextStore::new(10, Duration::from_secs(3600));
        store.session("alice").await;
        assert_eq!(store.evict_expired().await, 0);
    }
}
