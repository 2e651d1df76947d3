//! Pending-call registry correlating outbound call ids with completions.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::protocol::{ErrorInfo, ReplyValue};

/// Completion handle for one pending call.
///
/// Settled exactly once: with `Ok` when the matching success reply arrives,
/// with `Err` when the worker reports an error for the call's id. The
/// `oneshot` sender enforces the exactly-once property.
pub type Completion = oneshot::Sender<Result<ReplyValue, ErrorInfo>>;

/// Registry of calls that have been issued but not yet completed.
///
/// Ids are unique and monotonically increasing for the lifetime of one
/// registry instance; a fresh registry (after `reset()`) starts over from
/// zero. The registry itself is a plain keyed store; the channel adapter
/// wraps it in a mutex because callers and the dispatch task touch it from
/// different tasks.
#[derive(Default)]
pub struct CallRegistry {
    next_id: u64,
    pending: HashMap<u64, Completion>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and store `completion` under it. Never fails.
    pub fn issue(&mut self, completion: Completion) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, completion);
        id
    }

    /// Remove and return the completion for `id`.
    ///
    /// A missing id (never issued, already fetched, or `None`) returns
    /// `None` without raising: replies are delivered at most once and
    /// id-less messages never touch the registry.
    pub fn fetch(&mut self, id: Option<u64>) -> Option<Completion> {
        self.pending.remove(&id?)
    }

    /// The most recently issued id, if any call has been issued.
    pub fn last_id(&self) -> Option<u64> {
        self.next_id.checked_sub(1)
    }

    /// Number of calls currently pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
