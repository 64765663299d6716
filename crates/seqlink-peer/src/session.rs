use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use seqlink_pack::{Pack, PackError, UnpackEvent, Unpacker};
use tracing::{debug, info};

use crate::queue::{AckCallback, MsgId, PendingSend, SendQueue, Seq};

/// Opaque recovery key addressing a session across reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Errors from session recovery or creation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists under the presented recovery key.
    #[error("invalid session key '{0}'")]
    InvalidKey(String),

    /// The session store failed internally.
    #[error("session store failure: {0}")]
    Internal(String),
}

/// Progress marker: the id and seq of an inbound pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub id: MsgId,
    pub seq: Seq,
}

/// The per-session record surviving reconnects.
struct SessionState {
    /// Last fully received and acknowledged inbound pack.
    last_ack: Option<Progress>,
    /// Inbound pack currently mid-receive (header seen, body incomplete).
    last_merging: Option<Progress>,
    queue: SendQueue,
    unpacker: Unpacker,
    /// Wiring generation: only the transfer holding the current epoch may
    /// touch the queue or demultiplexer.
    epoch: u64,
}

/// Handle to a session's durable state. Cheap to clone; all clones address
/// the same record.
#[derive(Clone)]
pub struct Session {
    key: SessionKey,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn new(key: SessionKey) -> Self {
        Self {
            key,
            state: Arc::new(Mutex::new(SessionState {
                last_ack: None,
                last_merging: None,
                queue: SendQueue::new(),
                unpacker: Unpacker::new(),
                epoch: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The recovery key addressing this session.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Marker of the last fully received inbound pack.
    pub fn last_ack(&self) -> Option<Progress> {
        self.lock().last_ack
    }

    /// Marker of the inbound pack that was mid-receive, if any. After a
    /// reconnect this identifies the message interrupted by the disconnect.
    pub fn last_merging(&self) -> Option<Progress> {
        self.lock().last_merging
    }

    /// The (id, seq) pairs of sends still awaiting acknowledgment, in send
    /// order. The surface an application retransmission policy builds on.
    pub fn pending_sends(&self) -> Vec<(MsgId, Seq)> {
        self.lock().queue.pending().collect()
    }

    /// True if a send is still pending under `id`.
    pub fn has_pending(&self, id: MsgId) -> bool {
        self.lock().queue.is_pending(id)
    }

    /// Claim the session wiring for a new transfer.
    ///
    /// Bumps the epoch, detaching whichever transfer held it before: the
    /// latest successful handshake is authoritative, and a stale transfer's
    /// subsequent operations fail instead of consuming another connection's
    /// events.
    pub(crate) fn attach(&self) -> u64 {
        let mut state = self.lock();
        state.epoch += 1;
        debug!(session = %self.key, epoch = state.epoch, "transfer attached");
        state.epoch
    }

    /// Lock the state for the transfer holding `epoch`; `None` if a newer
    /// transfer has attached since.
    pub(crate) fn attached(&self, epoch: u64) -> Option<StateGuard<'_>> {
        let guard = self.lock();
        (guard.epoch == epoch).then_some(StateGuard { guard })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("last_ack", &state.last_ack)
            .field("last_merging", &state.last_merging)
            .field("pending", &state.queue.len())
            .field("epoch", &state.epoch)
            .finish()
    }
}

/// Epoch-checked access to a session's mutable state.
pub(crate) struct StateGuard<'a> {
    guard: MutexGuard<'a, SessionState>,
}

impl StateGuard<'_> {
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        self.guard.unpacker.feed(bytes);
    }

    pub(crate) fn poll(&mut self) -> Result<Option<UnpackEvent>, PackError> {
        self.guard.unpacker.poll()
    }

    pub(crate) fn enqueue(&mut self, pack: Pack, on_ack: Option<AckCallback>) -> (MsgId, Seq) {
        self.guard.queue.add(pack, on_ack)
    }

    pub(crate) fn resolve_ack(&mut self, id: MsgId) -> Option<PendingSend> {
        self.guard.queue.ack(id)
    }

    pub(crate) fn record_ack(&mut self, progress: Progress) {
        advance(&mut self.guard.last_ack, progress);
    }

    pub(crate) fn record_merging(&mut self, progress: Progress) {
        advance(&mut self.guard.last_merging, progress);
    }
}

/// Markers advance only; a replayed earlier message after a reconnect must
/// not regress them.
fn advance(slot: &mut Option<Progress>, progress: Progress) {
    if slot.map_or(true, |current| progress.seq >= current.seq) {
        *slot = Some(progress);
    }
}

/// Key-addressed store of sessions.
///
/// `start` recovers an existing session by key or creates a fresh one with
/// a generated key; `open` binds a key agreed out-of-band.
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionKey, Session>>,
    salt: u64,
    next: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        let salt = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            sessions: Mutex::new(HashMap::new()),
            salt,
            next: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recover a session by key, or create a fresh one when no key is given.
    ///
    /// An unknown key fails with [`SessionError::InvalidKey`]; the caller
    /// decides whether that becomes a wire ERROR or a local failure.
    pub fn start(&self, key: Option<&SessionKey>) -> Result<Session, SessionError> {
        match key {
            Some(key) => {
                let sessions = self.lock();
                let session = sessions
                    .get(key)
                    .cloned()
                    .ok_or_else(|| SessionError::InvalidKey(key.as_str().to_string()))?;
                debug!(session = %key, "recovered session");
                Ok(session)
            }
            None => {
                let key = self.generate_key();
                let session = Session::new(key.clone());
                self.lock().insert(key.clone(), session.clone());
                info!(session = %key, "created session");
                Ok(session)
            }
        }
    }

    /// Get or create the session bound to `key`.
    ///
    /// For applications that distribute recovery keys out-of-band and need
    /// both peers addressing one session under the same key.
    pub fn open(&self, key: &SessionKey) -> Session {
        self.lock()
            .entry(key.clone())
            .or_insert_with(|| {
                info!(session = %key, "created session");
                Session::new(key.clone())
            })
            .clone()
    }

    /// True if a session exists under `key`.
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn generate_key(&self) -> SessionKey {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        SessionKey::new(format!("{:012x}-{:04x}", self.salt & 0xffff_ffff_ffff, n))
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sessions_get_distinct_keys() {
        let manager = SessionManager::new();
        let a = manager.start(None).unwrap();
        let b = manager.start(None).unwrap();
        assert_ne!(a.key(), b.key());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn unknown_key_is_invalid() {
        let manager = SessionManager::new();
        let result = manager.start(Some(&SessionKey::new("nope")));
        assert!(matches!(result, Err(SessionError::InvalidKey(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn recovery_returns_the_same_record() {
        let manager = SessionManager::new();
        let created = manager.start(None).unwrap();
        let epoch = created.attach();
        created
            .attached(epoch)
            .unwrap()
            .record_ack(Progress { id: 4, seq: 4 });

        let recovered = manager.start(Some(&created.key().clone())).unwrap();
        assert_eq!(recovered.last_ack(), Some(Progress { id: 4, seq: 4 }));
    }

    #[test]
    fn open_is_get_or_create() {
        let manager = SessionManager::new();
        let key = SessionKey::new("shared-key");
        let first = manager.open(&key);
        let second = manager.open(&key);
        assert_eq!(first.key(), second.key());
        assert_eq!(manager.len(), 1);
        assert!(manager.contains(&key));
        assert!(manager.start(Some(&key)).is_ok());
    }

    #[test]
    fn markers_never_regress() {
        let session = Session::new(SessionKey::new("m"));
        let epoch = session.attach();

        let mut guard = session.attached(epoch).unwrap();
        guard.record_merging(Progress { id: 3, seq: 3 });
        guard.record_ack(Progress { id: 3, seq: 3 });
        // A replayed earlier message must not move the markers backwards.
        guard.record_merging(Progress { id: 2, seq: 2 });
        guard.record_ack(Progress { id: 2, seq: 2 });
        drop(guard);

        assert_eq!(session.last_merging(), Some(Progress { id: 3, seq: 3 }));
        assert_eq!(session.last_ack(), Some(Progress { id: 3, seq: 3 }));
    }

    #[test]
    fn markers_accept_equal_seq() {
        let session = Session::new(SessionKey::new("m2"));
        let epoch = session.attach();
        let mut guard = session.attached(epoch).unwrap();
        guard.record_merging(Progress { id: 5, seq: 5 });
        guard.record_merging(Progress { id: 5, seq: 5 });
        drop(guard);
        assert_eq!(session.last_merging(), Some(Progress { id: 5, seq: 5 }));
    }

    #[test]
    fn newer_attachment_detaches_the_old_epoch() {
        let session = Session::new(SessionKey::new("e"));
        let first = session.attach();
        assert!(session.attached(first).is_some());

        let second = session.attach();
        assert!(session.attached(first).is_none());
        assert!(session.attached(second).is_some());
    }

    #[test]
    fn queue_state_survives_reattachment() {
        let session = Session::new(SessionKey::new("q"));
        let first = session.attach();
        session
            .attached(first)
            .unwrap()
            .enqueue(Pack::with_body("p1"), None);

        // Reconnect: a new transfer claims the wiring; the queue persists.
        let second = session.attach();
        assert_eq!(session.pending_sends(), vec![(1, 1)]);
        let (id, seq) = session
            .attached(second)
            .unwrap()
            .enqueue(Pack::with_body("p2"), None);
        assert_eq!((id, seq), (2, 2));
    }
}
