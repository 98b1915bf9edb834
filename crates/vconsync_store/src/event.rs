//! Change notification events.

/// A notification that a key was mutated in the source store.
///
/// Produced by the source store's keyspace-notification machinery, consumed
/// exactly once by the change listener, then discarded. It carries no
/// payload: the listener always re-fetches the key's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Notification channel name, `__keyspace@<db>__:<key>`.
    pub channel: String,
    /// Mutation operation tag, e.g. `set`, `hset` or `json.set`.
    pub kind: String,
}

impl ChangeEvent {
    /// Creates a new change event.
    pub fn new(channel: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            kind: kind.into(),
        }
    }
}
