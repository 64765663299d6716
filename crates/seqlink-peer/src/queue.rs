use seqlink_pack::Pack;

/// Identifier of a pending send, unique while the entry is unresolved.
pub type MsgId = u64;

/// Per-session monotonic sequence number.
pub type Seq = u64;

/// Completion callback invoked when a send's matching ACK is processed.
/// `FnOnce` makes "fires at most once per send" structural.
pub type AckCallback = Box<dyn FnOnce() + Send + 'static>;

/// A send awaiting acknowledgment.
pub struct PendingSend {
    pub id: MsgId,
    pub seq: Seq,
    /// The pack as submitted, before header stamping.
    pub pack: Pack,
    on_ack: Option<AckCallback>,
}

impl PendingSend {
    /// Consume the entry and take its completion callback, if any.
    pub fn into_callback(self) -> Option<AckCallback> {
        self.on_ack
    }
}

impl std::fmt::Debug for PendingSend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSend")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .field("has_callback", &self.on_ack.is_some())
            .finish()
    }
}

/// Tracks unacknowledged sends and allocates message ids and sequence
/// numbers.
///
/// The counters belong to the session and are never reset while it lives,
/// so an id issued before a disconnect is not reused afterwards while a
/// late ACK for it could still arrive.
#[derive(Debug, Default)]
pub struct SendQueue {
    next_id: MsgId,
    next_seq: Seq,
    pending: Vec<PendingSend>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a send: allocate a fresh id and the next sequence number,
    /// store the pending entry, and return both for header stamping.
    pub fn add(&mut self, pack: Pack, on_ack: Option<AckCallback>) -> (MsgId, Seq) {
        self.next_id += 1;
        self.next_seq += 1;
        let (id, seq) = (self.next_id, self.next_seq);
        self.pending.push(PendingSend {
            id,
            seq,
            pack,
            on_ack,
        });
        (id, seq)
    }

    /// Resolve an acknowledgment.
    ///
    /// Removes and returns the matching entry; `None` if no entry is
    /// pending under `id`, which makes duplicate and late ACKs no-ops.
    pub fn ack(&mut self, id: MsgId) -> Option<PendingSend> {
        let index = self.pending.iter().position(|entry| entry.id == id)?;
        Some(self.pending.remove(index))
    }

    /// True if a send is pending under `id`.
    pub fn is_pending(&self, id: MsgId) -> bool {
        self.pending.iter().any(|entry| entry.id == id)
    }

    /// The (id, seq) pairs of all pending sends, in send order.
    pub fn pending(&self) -> impl Iterator<Item = (MsgId, Seq)> + '_ {
        self.pending.iter().map(|entry| (entry.id, entry.seq))
    }

    /// Number of pending sends.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
