// crates/pce-core/src/runtime/broadcast.rs
// ============================================================================
// Module: PCE Transcript Broadcaster
// Description: Live fan-out of persisted transcript items.
// Purpose: Push every appended item to subscribed stream consumers.
// Dependencies: crate::core, tokio
// ============================================================================

//! ## Overview
//! The store-assigned transcript sequence is the single source of truth;
//! streams are views of it. The broadcaster pushes each item after it commits.
//! Delivery is at-least-once per live subscriber: a lagging subscriber drops
//! items from the channel and recovers them via the cursor catch-up endpoint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tokio::sync::broadcast;

use crate::core::TranscriptItem;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Buffered items per subscriber before lag eviction.
const CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Broadcaster
// ============================================================================

/// Live transcript fan-out.
#[derive(Debug, Clone)]
pub struct TranscriptBroadcaster {
    /// Broadcast channel sender.
    sender: broadcast::Sender<TranscriptItem>,
}

impl Default for TranscriptBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptBroadcaster {
    /// Creates a broadcaster.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes a committed transcript item to live subscribers.
    ///
    /// Publishing with no subscribers is not an error; the item remains
    /// recoverable through the cursor catch-up endpoint.
    pub fn publish(&self, item: TranscriptItem) {
        let _ = self.sender.send(item);
    }

    /// Subscribes to items committed after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptItem> {
        self.sender.subscribe()
    }
}
