use std::{collections::HashMap, num::NonZeroUsize};

use schema::{Record, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendStats {
    /// Records held for the user after the append.
    pub retained: usize,
    /// Records discarded to stay within the limit, old and new combined.
    pub dropped: usize,
}

/// Per-user record sequences capped at `limit` records each.
///
/// The store itself is not synchronized; callers hold one lock across the
/// whole of every operation so truncation never interleaves.
#[derive(Debug)]
pub struct MessageStore {
    limit: NonZeroUsize,
    messages: HashMap<UserId, Vec<Record>>,
}

impl MessageStore {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            limit,
            messages: HashMap::new(),
        }
    }

    /// Appends `records` for `user_id`, then drops the oldest records until at
    /// most `limit` remain. A batch at least `limit` long replaces the whole
    /// sequence with its own tail.
    pub fn append(&mut self, user_id: &UserId, records: Vec<Record>) -> AppendStats {
        let limit = self.limit.get();
        let incoming = records.len();
        let existing = self.messages.get(user_id).map_or(0, Vec::len);

        if incoming >= limit {
            let skip = incoming - limit;
            let kept: Vec<Record> = records.into_iter().skip(skip).collect();
            self.messages.insert(user_id.clone(), kept);
            return AppendStats {
                retained: limit,
                dropped: existing + skip,
            };
        }

        let sequence = self.messages.entry(user_id.clone()).or_default();
        let overflow = (sequence.len() + incoming).saturating_sub(limit);
        sequence.drain(..overflow);
        sequence.extend(records);
        AppendStats {
            retained: sequence.len(),
            dropped: overflow,
        }
    }

    /// Snapshot of the user's records, empty when nothing is stored.
    pub fn read(&self, user_id: &UserId) -> Vec<Record> {
        self.messages.get(user_id).cloned().unwrap_or_default()
    }

    /// Returns whether the user had an entry.
    pub fn clear(&mut self, user_id: &UserId) -> bool {
        self.messages.remove(user_id).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Messages,
    BatchMessages,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::BatchMessages => "batch_messages",
        }
    }
}

/// The plain and batch stores kept side by side under one limit.
#[derive(Debug)]
pub struct ReceivedMessages {
    messages: MessageStore,
    batch_messages: MessageStore,
}

impl ReceivedMessages {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            messages: MessageStore::new(limit),
            batch_messages: MessageStore::new(limit),
        }
    }

    fn store(&self, kind: StoreKind) -> &MessageStore {
        match kind {
            StoreKind::Messages => &self.messages,
            StoreKind::BatchMessages => &self.batch_messages,
        }
    }

    fn store_mut(&mut self, kind: StoreKind) -> &mut MessageStore {
        match kind {
            StoreKind::Messages => &mut self.messages,
            StoreKind::BatchMessages => &mut self.batch_messages,
        }
    }

    pub fn append(
        &mut self,
        kind: StoreKind,
        user_id: &UserId,
        records: Vec<Record>,
    ) -> AppendStats {
        self.store_mut(kind).append(user_id, records)
    }

    pub fn read(&self, kind: StoreKind, user_id: &UserId) -> Vec<Record> {
        self.store(kind).read(user_id)
    }

    /// Removes the user from both stores.
    pub fn clear_user(&mut self, user_id: &UserId) {
        self.messages.clear(user_id);
        self.batch_messages.clear(user_id);
    }
}
