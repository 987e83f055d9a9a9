use crate::payload::Payload;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// The latest message seen on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMessage {
    pub payload: Payload,
    /// Cache-wide write counter; strictly increasing across `set` calls.
    pub seq: u64,
    pub received_at: DateTime<Utc>,
}

impl CachedMessage {
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.received_at)
            .num_seconds()
            .max(0)
    }
}

#[derive(Debug, Default)]
struct Entries {
    by_topic: HashMap<String, Arc<CachedMessage>>,
    last_seq: u64,
}

/// Last-value store shared between the bus receive task and the pages.
///
/// Entries are immutable once published; readers clone an `Arc` under the
/// read lock and never observe a half-written value. The write lock is held
/// only for the map insert.
#[derive(Debug, Default)]
pub struct TopicCache {
    entries: RwLock<Entries>,
}

impl TopicCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the entry for `topic` and returns the sequence number it
    /// was stored under.
    pub fn set(&self, topic: impl Into<String>, payload: Payload) -> u64 {
        let topic = topic.into();
        let received_at = Utc::now();
        let mut entries = self.entries.write();
        entries.last_seq += 1;
        let seq = entries.last_seq;
        entries.by_topic.insert(
            topic,
            Arc::new(CachedMessage {
                payload,
                seq,
                received_at,
            }),
        );
        seq
    }

    pub fn get(&self, topic: &str) -> Option<Payload> {
        self.entry(topic).map(|entry| entry.payload.clone())
    }

    pub fn entry(&self, topic: &str) -> Option<Arc<CachedMessage>> {
        self.entries.read().by_topic.get(topic).cloned()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.entries.read().by_topic.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_topic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_seq(&self) -> u64 {
        self.entries.read().last_seq
    }

    /// Point-in-time copy of every entry, ordered by topic. Debug views only.
    pub fn snapshot(&self) -> BTreeMap<String, Arc<CachedMessage>> {
        self.entries
            .read()
            .by_topic
            .iter()
            .map(|(topic, entry)| (topic.clone(), Arc::clone(entry)))
            .collect()
    }
}
