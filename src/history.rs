//! Undo/redo history with hybrid snapshot + delta reconstruction.
//!
//! DESIGN
//! ======
//! The log is an ordered list of entries, each an `add`, `remove`, `modify`
//! or full `snapshot` action stamped with a sequence number that is never
//! reused. Position 0 is always a snapshot. `index` points at the entry that
//! produced the current store state.
//!
//! Undo and redo of `add`/`remove` are applied directly to the store (fast
//! path). Anything else rebuilds the target state from the nearest snapshot
//! at or before it, replaying the deltas in between (slow path). Both paths
//! must yield the same object set in the same draw order, which is why a
//! `remove` keeps the draw-order slot it vacated.
//!
//! Modifications are debounced per object: the first `before` and the latest
//! `after` are held until the quiet period elapses or another operation
//! forces a flush.
//!
//! ERROR HANDLING
//! ==============
//! Reconstruction works on a scratch copy and only touches the store once it
//! has fully succeeded, so a corrupted log leaves the store unchanged.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::doc::{DocStore, ObjectId, ObjectRecord, StoreEvent};

/// One recorded change.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryAction {
    /// An object was created.
    Add { id: ObjectId, record: ObjectRecord },
    /// An object was deleted from draw-order slot `position`.
    Remove { id: ObjectId, record: ObjectRecord, position: usize },
    /// An object changed in place.
    Modify { id: ObjectId, before: ObjectRecord, after: ObjectRecord },
    /// Every object on the surface, in draw order.
    Snapshot { state: Vec<ObjectRecord> },
}

impl HistoryAction {
    /// Short name for log lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Modify { .. } => "modify",
            Self::Snapshot { .. } => "snapshot",
        }
    }
}

/// A log entry: an action and its sequence stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub seq: u64,
    pub action: HistoryAction,
}

/// Errors raised while rebuilding a past state. All indicate a corrupted log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("no snapshot at or before index {index}")]
    NoSnapshot { index: usize },
    #[error("object {id} missing while replaying index {index}")]
    MissingObject { id: ObjectId, index: usize },
    #[error("object {id} already present while replaying index {index}")]
    DuplicateObject { id: ObjectId, index: usize },
}

#[derive(Debug, Clone)]
struct PendingModify {
    id: ObjectId,
    before: ObjectRecord,
    after: ObjectRecord,
    deadline_ms: u64,
}

/// The undo/redo log and its debounce queue.
#[derive(Debug, Clone)]
pub struct History {
    log: Vec<HistoryEntry>,
    index: usize,
    saved_seq: Option<u64>,
    next_seq: u64,
    pending: Vec<PendingModify>,
    cap: usize,
    keep: usize,
    debounce_ms: u64,
}

impl History {
    /// A log holding one snapshot of `initial`, marked saved.
    #[must_use]
    pub fn new(initial: Vec<ObjectRecord>, cap: usize, keep: usize, debounce_ms: u64) -> Self {
        let cap = cap.max(2);
        let mut history = Self {
            log: Vec::new(),
            index: 0,
            saved_seq: None,
            next_seq: 0,
            pending: Vec::new(),
            cap,
            keep: keep.clamp(1, cap),
            debounce_ms,
        };
        history.reset(initial);
        history
    }

    #[must_use]
    pub fn from_config(initial: Vec<ObjectRecord>, config: &EngineConfig) -> Self {
        Self::new(initial, config.history_cap, config.history_keep, config.modify_debounce_ms)
    }

    /// Discard everything and start over from a single saved snapshot.
    pub fn reset(&mut self, initial: Vec<ObjectRecord>) {
        self.log.clear();
        self.pending.clear();
        let seq = self.mint_seq();
        self.log.push(HistoryEntry { seq, action: HistoryAction::Snapshot { state: initial } });
        self.index = 0;
        self.saved_seq = Some(seq);
    }

    // --- Queries ---

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Always false: the log holds at least its base snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.log
    }

    /// Whether a debounced modify is waiting to be recorded.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0 || self.has_pending()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.log.len() && !self.has_pending()
    }

    /// Sequence stamp of the entry at `index`.
    #[must_use]
    pub fn current_seq(&self) -> u64 {
        self.log.get(self.index).map_or(0, |e| e.seq)
    }

    /// Position of the last saved entry, if it is still in the log.
    #[must_use]
    pub fn last_saved_index(&self) -> Option<usize> {
        let saved = self.saved_seq?;
        self.log.iter().position(|e| e.seq == saved)
    }

    /// Whether the current state differs from the last saved one.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.has_pending() || self.saved_seq != Some(self.current_seq())
    }

    /// Record that the state stamped `seq` reached storage.
    pub fn mark_saved(&mut self, seq: u64) {
        self.saved_seq = Some(seq);
    }

    // --- Recording ---

    /// Feed one store event into the log.
    pub fn record(&mut self, event: StoreEvent, now_ms: u64) {
        match event {
            StoreEvent::Added { record } => {
                self.flush_pending();
                self.push(HistoryAction::Add { id: record.id(), record });
            }
            StoreEvent::Removed { record, position } => {
                self.flush_pending();
                self.push(HistoryAction::Remove { id: record.id(), record, position });
            }
            StoreEvent::Modified { before, after } => self.queue_modify(before, after, now_ms),
            StoreEvent::Unrecorded { id, error } => {
                warn!(id, %error, "mutation not recorded in history");
            }
        }
    }

    /// Append a full snapshot after a structural change.
    pub fn record_snapshot(&mut self, state: Vec<ObjectRecord>) {
        self.flush_pending();
        self.push(HistoryAction::Snapshot { state });
    }

    /// Record every debounced modify whose quiet period has elapsed.
    ///
    /// Returns whether anything was recorded.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        let (due, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.deadline_ms <= now_ms);
        self.pending = waiting;
        let mut recorded = false;
        for p in due {
            recorded |= self.commit_modify(p);
        }
        recorded
    }

    /// Record every debounced modify now. Returns whether anything was recorded.
    pub fn flush_pending(&mut self) -> bool {
        let mut recorded = false;
        for p in std::mem::take(&mut self.pending) {
            recorded |= self.commit_modify(p);
        }
        recorded
    }

    fn queue_modify(&mut self, before: ObjectRecord, after: ObjectRecord, now_ms: u64) {
        let id = after.id();
        let deadline_ms = now_ms.saturating_add(self.debounce_ms);
        if let Some(p) = self.pending.iter_mut().find(|p| p.id == id) {
            p.after = after;
            p.deadline_ms = deadline_ms;
        } else {
            self.pending.push(PendingModify { id, before, after, deadline_ms });
        }
    }

    fn commit_modify(&mut self, p: PendingModify) -> bool {
        if p.before == p.after {
            debug!(id = p.id, "coalesced modify is a no-op");
            return false;
        }
        self.push(HistoryAction::Modify { id: p.id, before: p.before, after: p.after });
        true
    }

    fn push(&mut self, action: HistoryAction) {
        if self.index + 1 < self.log.len() {
            debug!(index = self.index, discarded = self.log.len() - self.index - 1, "truncating redo branch");
            self.log.truncate(self.index + 1);
        }
        let seq = self.mint_seq();
        self.log.push(HistoryEntry { seq, action });
        self.index = self.log.len() - 1;
        if self.log.len() > self.cap {
            self.compact();
        }
    }

    fn mint_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Squash the head of the log into a snapshot, keeping `keep` entries.
    fn compact(&mut self) {
        let cut = (self.log.len() - self.keep).min(self.index);
        if cut == 0 {
            return;
        }
        let state = match self.state_at(cut) {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, cut, "history compaction skipped");
                return;
            }
        };
        let seq = self.log[cut].seq;
        self.log.drain(..cut);
        self.log[0] = HistoryEntry { seq, action: HistoryAction::Snapshot { state } };
        self.index -= cut;
        info!(cut, len = self.log.len(), index = self.index, "history compacted");
    }

    // --- Undo / redo ---

    /// Step back one entry.
    ///
    /// Returns `Ok(false)` when there is nothing to undo.
    ///
    /// # Errors
    ///
    /// Fails when the log cannot be replayed; the store is left untouched.
    pub fn undo(&mut self, store: &mut DocStore) -> Result<bool, HistoryError> {
        self.flush_pending();
        if self.index == 0 {
            return Ok(false);
        }
        let target = self.index - 1;
        let fast = match &self.log[self.index].action {
            HistoryAction::Add { id, .. } => store.quietly(|s| s.remove(*id)).is_some(),
            HistoryAction::Remove { record, position, .. } => {
                store.quietly(|s| s.restore(record.clone(), Some(*position)))
            }
            HistoryAction::Modify { .. } | HistoryAction::Snapshot { .. } => false,
        };
        if !fast {
            self.rebuild(store, target)?;
        }
        self.index = target;
        debug!(index = self.index, fast, "undo");
        Ok(true)
    }

    /// Step forward one entry.
    ///
    /// Returns `Ok(false)` when there is nothing to redo.
    ///
    /// # Errors
    ///
    /// Fails when the log cannot be replayed; the store is left untouched.
    pub fn redo(&mut self, store: &mut DocStore) -> Result<bool, HistoryError> {
        // A live edit after undo starts a new branch.
        self.flush_pending();
        let target = self.index + 1;
        let Some(entry) = self.log.get(target) else {
            return Ok(false);
        };
        let fast = match &entry.action {
            HistoryAction::Add { record, .. } => store.quietly(|s| s.restore(record.clone(), None)),
            HistoryAction::Remove { id, .. } => store.quietly(|s| s.remove(*id)).is_some(),
            HistoryAction::Modify { .. } | HistoryAction::Snapshot { .. } => false,
        };
        if !fast {
            self.rebuild(store, target)?;
        }
        self.index = target;
        debug!(index = self.index, fast, "redo");
        Ok(true)
    }

    fn rebuild(&self, store: &mut DocStore, target: usize) -> Result<(), HistoryError> {
        let state = self.state_at(target).inspect_err(|e| {
            error!(error = %e, target, "history reconstruction failed");
        })?;
        store.load_snapshot(state);
        Ok(())
    }

    /// Rebuild the object set at log position `target` from the nearest
    /// snapshot and the deltas after it.
    ///
    /// # Errors
    ///
    /// Fails when no snapshot precedes `target` or a delta doesn't apply.
    pub fn state_at(&self, target: usize) -> Result<Vec<ObjectRecord>, HistoryError> {
        let last = self.log.len().checked_sub(1).ok_or(HistoryError::NoSnapshot { index: target })?;
        let target = target.min(last);
        let (base, mut state) = self
            .log
            .iter()
            .enumerate()
            .take(target + 1)
            .rev()
            .find_map(|(i, e)| match &e.action {
                HistoryAction::Snapshot { state } => Some((i, state.clone())),
                _ => None,
            })
            .ok_or(HistoryError::NoSnapshot { index: target })?;

        for (index, entry) in self.log.iter().enumerate().take(target + 1).skip(base + 1) {
            replay(&mut state, &entry.action, index)?;
        }
        Ok(state)
    }
}

fn replay(state: &mut Vec<ObjectRecord>, action: &HistoryAction, index: usize) -> Result<(), HistoryError> {
    let slot = |state: &[ObjectRecord], id: ObjectId| state.iter().position(|r| r.id() == id);
    match action {
        HistoryAction::Add { id, record } => {
            if slot(state, *id).is_some() {
                return Err(HistoryError::DuplicateObject { id: *id, index });
            }
            state.push(record.clone());
        }
        HistoryAction::Remove { id, .. } => {
            let at = slot(state, *id).ok_or(HistoryError::MissingObject { id: *id, index })?;
            state.remove(at);
        }
        HistoryAction::Modify { id, after, .. } => {
            let at = slot(state, *id).ok_or(HistoryError::MissingObject { id: *id, index })?;
            state[at] = after.clone();
        }
        HistoryAction::Snapshot { state: snapshot } => state.clone_from(snapshot),
    }
    Ok(())
}
