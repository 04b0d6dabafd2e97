//! Addressed message envelope passed through the shared mailbox.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved sender name marking a shutdown poison pill.
///
/// A pack whose sender equals this value tells any worker that observes it to
/// leave its scheduling loop. The pack is left in the queue on observation so
/// that every worker polling the same mailbox sees it too; the agency removes
/// it when it drains the queue during shutdown.
pub const EXIT_SIGNALER: &str = "***__EXIT_SIGNALER__***";

/// Marker trait for message payloads.
///
/// `Default` supplies the sentinel pack's empty item and `Clone` supports
/// fan-out sends to several recipients. Implemented for every qualifying type.
pub trait Payload: Clone + Default + Send + 'static {}

impl<T: Clone + Default + Send + 'static> Payload for T {}

/// An addressed message envelope: one item, one sender, one recipient.
///
/// Immutable once constructed. Sender and recipient are plain names; they are
/// not validated against any registry (the recipient may not be spawned yet).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pack<T> {
    /// The carried payload.
    pub item: T,
    /// Name of the producing worker (or an outside caller).
    pub sender: String,
    /// Name of the worker this pack is addressed to.
    pub recipient: String,
}

impl<T> Pack<T> {
    /// Create a pack addressed from `sender` to `recipient`.
    pub fn new(item: T, sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            item,
            sender: sender.into(),
            recipient: recipient.into(),
        }
    }

    /// Whether this pack is the shutdown poison pill.
    pub fn is_exit_signal(&self) -> bool {
        self.sender == EXIT_SIGNALER
    }
}

impl<T: Default> Pack<T> {
    /// Build the shutdown poison pill: default item, no particular recipient.
    pub fn exit_signal() -> Self {
        Self {
            item: T::default(),
            sender: EXIT_SIGNALER.to_string(),
            recipient: String::new(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Pack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pack[sender: {}, recipient: {}, item: {}]",
            self.sender, self.recipient, self.item
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
