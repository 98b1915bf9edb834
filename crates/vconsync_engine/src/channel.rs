//! Notification channel name parsing.
//!
//! Keyspace notifications arrive on channels of the form
//! `<namespace> ':' <key>`, where the namespace encodes the originating
//! database index (e.g. `__keyspace@0__`) and the key is everything after
//! the first `:`. The key itself may contain further colons
//! (`__keyspace@0__:vcon:123` carries the key `vcon:123`).

use crate::error::{EngineError, EngineResult};

/// Recovers the mutated key from a keyspace-notification channel name.
///
/// Fails with [`EngineError::ChannelParse`] when the delimiter is absent or
/// the key portion is empty.
pub fn key_from_channel(channel: &str) -> EngineResult<&str> {
    match channel.split_once(':') {
        Some((_, key)) if !key.is_empty() => Ok(key),
        _ => Err(EngineError::ChannelParse {
            channel: channel.to_owned(),
        }),
    }
}
