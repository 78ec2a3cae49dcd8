//! Keyspace notification channels and the server flags they need.

use dispenser_core::domain::{QueueName, StoreEvent};

/// Flags required on `notify-keyspace-events`: keyspace channel (`K`) and
/// list commands (`l`).
const REQUIRED_FLAGS: [char; 2] = ['K', 'l'];

/// List operations that add an item.
const APPEND_OPS: [&str; 2] = ["lpush", "rpush"];

/// `__keyspace@<db>__:<key>` naming for one database.
#[derive(Debug, Clone)]
pub struct KeyspaceChannel {
    prefix: String,
}

impl KeyspaceChannel {
    pub fn new(db: i64) -> Self {
        Self {
            prefix: format!("__keyspace@{db}__:"),
        }
    }

    pub fn channel_for(&self, queue: &QueueName) -> String {
        format!("{}{}", self.prefix, queue)
    }

    pub fn queue_of<'a>(&self, channel: &'a str) -> Option<&'a str> {
        channel.strip_prefix(self.prefix.as_str())
    }

    /// Turn one notification into a store event. `None` for foreign channels.
    pub fn event(&self, channel: &str, op: &str) -> Option<StoreEvent> {
        let queue = self.queue_of(channel)?;
        if APPEND_OPS.contains(&op) {
            Some(StoreEvent::appended(queue))
        } else {
            Some(StoreEvent::other(queue, op))
        }
    }
}

/// Add the flags we need to the server's current setting.
///
/// Returns `None` when nothing has to change. `A` already implies `l`.
pub fn merge_notify_flags(current: &str) -> Option<String> {
    let mut merged = current.to_string();
    for flag in REQUIRED_FLAGS {
        let covered = merged.contains(flag) || (flag == 'l' && merged.contains('A'));
        if !covered {
            merged.push(flag);
        }
    }
    (merged != current).then_some(merged)
}
