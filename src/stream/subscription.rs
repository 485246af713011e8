#![expect(
    clippy::module_name_repetitions,
    reason = "Subscription types deliberately include the module name for clarity"
)]

use std::collections::HashSet;

/// Set of subscribed topics.
///
/// Unique, and remembers insertion order so the full set can be re-announced as
/// an ordered list after a reconnect. Survives disconnects; only the owning
/// client mutates it.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    order: Vec<String>,
    members: HashSet<String>,
}

impl SubscriptionRegistry {
    /// Add `topics` to the set.
    ///
    /// Returns the requested topics with duplicates in the request removed,
    /// in request order. Topics already in the set are included.
    pub(crate) fn add(&mut self, topics: Vec<String>) -> Vec<String> {
        let requested = dedup(topics);
        for topic in &requested {
            if self.members.insert(topic.clone()) {
                self.order.push(topic.clone());
            }
        }
        requested
    }

    /// Remove `topics` from the set. Returns the requested topics, deduplicated.
    pub(crate) fn remove(&mut self, topics: Vec<String>) -> Vec<String> {
        let requested = dedup(topics);
        let mut removed_any = false;
        for topic in &requested {
            removed_any |= self.members.remove(topic);
        }
        if removed_any {
            self.order.retain(|topic| self.members.contains(topic));
        }
        requested
    }

    /// Current topics in insertion order.
    pub(crate) fn topics(&self) -> Vec<String> {
        self.order.clone()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, topic: &str) -> bool {
        self.members.contains(topic)
    }
}

fn dedup(topics: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(topics.len());
    topics
        .into_iter()
        .filter(|topic| seen.insert(topic.clone()))
        .collect()
}
