// crates/pce-core/src/runtime/store.rs
// ============================================================================
// Module: PCE In-Memory Store
// Description: Simple in-memory cognition store for tests and examples.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of
//! [`CognitionStore`] for tests and local demos. It is not intended for
//! production use; the durable store lives in `pce-store-sqlite`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::ApprovalId;
use crate::core::ApprovalRecord;
use crate::core::CciSnapshot;
use crate::core::CompletedAction;
use crate::core::NormalizedEvent;
use crate::core::StateSnapshot;
use crate::core::TranscriptEntry;
use crate::core::TranscriptItem;
use crate::interfaces::CognitionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable inner tables guarded by one mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Live state snapshot.
    state: StateSnapshot,
    /// Append-only normalized event log.
    events: Vec<NormalizedEvent>,
    /// Append-only completed action log.
    actions: Vec<CompletedAction>,
    /// Append-only coherence snapshot log.
    cci: Vec<CciSnapshot>,
    /// Approval records keyed by id, in insertion order.
    approvals: BTreeMap<String, ApprovalRecord>,
    /// Append-only transcript with assigned cursors.
    transcript: Vec<TranscriptItem>,
    /// Next transcript cursor to assign.
    next_cursor: u64,
}

/// In-memory cognition store for tests and examples.
#[derive(Debug, Clone)]
pub struct InMemoryCognitionStore {
    /// Tables protected by a mutex.
    inner: Arc<Mutex<Inner>>,
}

impl Default for InMemoryCognitionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCognitionStore {
    /// Creates a new in-memory cognition store.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { next_cursor: 1, ..Inner::default() })) }
    }

    /// Locks the inner tables, mapping poisoning into a store error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Store("store mutex poisoned".to_string()))
    }
}

impl CognitionStore for InMemoryCognitionStore {
    fn load_state(&self) -> Result<StateSnapshot, StoreError> {
        Ok(self.lock()?.state.clone())
    }

    fn save_state(&self, state: &StateSnapshot) -> Result<(), StoreError> {
        self.lock()?.state = state.clone();
        Ok(())
    }

    fn append_event(&self, event: &NormalizedEvent) -> Result<(), StoreError> {
        self.lock()?.events.push(event.clone());
        Ok(())
    }

    fn append_action(&self, action: &CompletedAction) -> Result<(), StoreError> {
        self.lock()?.actions.push(action.clone());
        Ok(())
    }

    fn recent_actions(&self, limit: usize) -> Result<Vec<CompletedAction>, StoreError> {
        let guard = self.lock()?;
        let mut actions = guard.actions.clone();
        actions.sort_by_key(|action| action.completed_at);
        let start = actions.len().saturating_sub(limit);
        Ok(actions[start..].to_vec())
    }

    fn append_cci(&self, snapshot: &CciSnapshot) -> Result<(), StoreError> {
        self.lock()?.cci.push(snapshot.clone());
        Ok(())
    }

    fn cci_history(&self, limit: usize) -> Result<Vec<CciSnapshot>, StoreError> {
        let guard = self.lock()?;
        let start = guard.cci.len().saturating_sub(limit);
        Ok(guard.cci[start..].to_vec())
    }

    fn put_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        self.lock()?.approvals.insert(record.approval_id.to_string(), record.clone());
        Ok(())
    }

    fn approval(&self, id: &ApprovalId) -> Result<Option<ApprovalRecord>, StoreError> {
        Ok(self.lock()?.approvals.get(id.as_str()).cloned())
    }

    fn approvals(&self) -> Result<Vec<ApprovalRecord>, StoreError> {
        let guard = self.lock()?;
        let mut records: Vec<ApprovalRecord> = guard.approvals.values().cloned().collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    fn append_transcript(&self, entry: &TranscriptEntry) -> Result<TranscriptItem, StoreError> {
        let mut guard = self.lock()?;
        let cursor = guard.next_cursor;
        guard.next_cursor += 1;
        let item = TranscriptItem::from_entry(cursor, entry.clone());
        guard.transcript.push(item.clone());
        Ok(item)
    }

    fn transcript_since(
        &self,
        cursor: u64,
        limit: usize,
    ) -> Result<Vec<TranscriptItem>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .transcript
            .iter()
            .filter(|item| item.cursor > cursor)
            .take(limit)
            .cloned()
            .collect())
    }

    fn latest_cursor(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.next_cursor.saturating_sub(1))
    }
}
