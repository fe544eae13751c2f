use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::camera::Point;
use crate::doc::{BrushKind, DrawableObject, Style};

// =============================================================
// Helpers
// =============================================================

struct Harness {
    store: DocStore,
    history: History,
    now: u64,
}

impl Harness {
    fn new(cap: usize, keep: usize) -> Self {
        let mut store = DocStore::new();
        store.add(DrawableObject::background(800.0, 1000.0));
        store.drain_events();
        let history = History::new(store.serialize_all().unwrap(), cap, keep, 500);
        Self { store, history, now: 0 }
    }

    fn sync(&mut self) {
        for event in self.store.drain_events() {
            self.history.record(event, self.now);
        }
    }

    fn add(&mut self, y: f64) -> ObjectId {
        let id = self.store.add(DrawableObject::stroke(
            BrushKind::Pen,
            vec![Point::new(10.0, y), Point::new(20.0, y)],
            Style::default(),
        ));
        self.sync();
        id
    }

    fn remove(&mut self, id: ObjectId) {
        self.store.remove(id);
        self.sync();
    }

    fn nudge(&mut self, id: ObjectId, dx: f64) {
        self.store.modify(id, |o| o.translate(dx, 0.0));
        self.sync();
    }

    fn snapshot(&mut self) {
        let state = self.store.serialize_all().unwrap();
        self.history.record_snapshot(state);
    }

    fn state(&self) -> Vec<ObjectRecord> {
        self.store.serialize_all().unwrap()
    }

    fn ids(&self) -> Vec<ObjectId> {
        self.store.objects_in_order().map(|o| o.id).collect()
    }

    fn assert_consistent(&self) {
        assert_eq!(self.state(), self.history.state_at(self.history.index()).unwrap());
    }
}

// =============================================================
// Initial state
// =============================================================

#[test]
fn starts_with_single_saved_snapshot() {
    let h = Harness::new(150, 50);
    assert_eq!(h.history.len(), 1);
    assert_eq!(h.history.index(), 0);
    assert!(matches!(h.history.entries()[0].action, HistoryAction::Snapshot { .. }));
    assert!(!h.history.is_dirty());
    assert_eq!(h.history.last_saved_index(), Some(0));
    assert!(!h.history.can_undo());
    assert!(!h.history.can_redo());
}

#[test]
fn undo_at_start_is_noop() {
    let mut h = Harness::new(150, 50);
    assert_eq!(h.history.undo(&mut h.store), Ok(false));
    assert_eq!(h.history.redo(&mut h.store), Ok(false));
}

// =============================================================
// Add / remove fast paths
// =============================================================

#[test]
fn add_is_recorded_and_undone_in_place() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    assert_eq!(h.history.len(), 2);
    assert_eq!(h.history.entries()[1].action.kind(), "add");

    assert_eq!(h.history.undo(&mut h.store), Ok(true));
    assert!(h.store.get(id).is_none());
    assert!(h.store.drain_events().is_empty(), "replay must not raise events");

    assert_eq!(h.history.redo(&mut h.store), Ok(true));
    assert!(h.store.get(id).is_some(), "redo reuses the original id");
    h.assert_consistent();
}

#[test]
fn undo_remove_restores_draw_order() {
    let mut h = Harness::new(150, 50);
    let a = h.add(10.0);
    let b = h.add(20.0);
    let c = h.add(30.0);
    h.remove(b);
    assert_eq!(h.ids()[1..], [a, c]);

    h.history.undo(&mut h.store).unwrap();
    assert_eq!(h.ids()[1..], [a, b, c]);
    h.assert_consistent();

    h.history.redo(&mut h.store).unwrap();
    assert_eq!(h.ids()[1..], [a, c]);
    h.assert_consistent();
}

// =============================================================
// Debounced modify
// =============================================================

#[test]
fn modify_waits_for_quiet_period() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    h.now = 1000;
    h.nudge(id, 5.0);
    assert_eq!(h.history.len(), 2);
    assert!(h.history.has_pending());
    assert!(h.history.is_dirty());

    assert!(!h.history.tick(1499));
    assert!(h.history.tick(1500));
    assert_eq!(h.history.len(), 3);
    assert_eq!(h.history.entries()[2].action.kind(), "modify");
}

#[test]
fn rapid_modifies_coalesce_first_before_last_after() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    let original = h.store.get(id).unwrap().to_record().unwrap();
    for step in 0..5 {
        h.now = 100 * step;
        h.nudge(id, 1.0);
    }
    let latest = h.store.get(id).unwrap().to_record().unwrap();
    assert!(!h.history.tick(800));
    assert!(h.history.tick(900));
    match &h.history.entries()[2].action {
        HistoryAction::Modify { before, after, .. } => {
            assert_eq!(before, &original);
            assert_eq!(after, &latest);
        }
        other => panic!("unexpected action {other:?}"),
    }
    assert_eq!(h.history.len(), 3);
}

#[test]
fn modify_that_returns_to_start_records_nothing() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    h.nudge(id, 5.0);
    h.nudge(id, -5.0);
    assert!(!h.history.flush_pending());
    assert_eq!(h.history.len(), 2);
    assert!(!h.history.has_pending());
}

#[test]
fn add_flushes_pending_modify_first() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    h.nudge(id, 5.0);
    h.add(20.0);
    let kinds: Vec<_> = h.history.entries().iter().map(|e| e.action.kind()).collect();
    assert_eq!(kinds, ["snapshot", "add", "modify", "add"]);
}

#[test]
fn undo_flushes_and_reverts_latest_modify() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    let original = h.store.get(id).unwrap().clone();
    h.nudge(id, 5.0);
    assert!(h.history.can_undo());
    h.history.undo(&mut h.store).unwrap();
    assert_eq!(h.store.get(id), Some(&original));
    assert_eq!(h.history.index(), 1);
}

#[test]
fn edit_after_undo_discards_redo_on_redo() {
    let mut h = Harness::new(150, 50);
    let a = h.add(10.0);
    h.add(20.0);
    h.history.undo(&mut h.store).unwrap();
    h.nudge(a, 3.0);
    assert!(!h.history.can_redo());
    assert_eq!(h.history.redo(&mut h.store), Ok(false));
    assert_eq!(h.history.entries().last().unwrap().action.kind(), "modify");
}

// =============================================================
// Snapshots and the slow path
// =============================================================

#[test]
fn snapshot_undo_rebuilds_previous_state() {
    let mut h = Harness::new(150, 50);
    let a = h.add(10.0);
    let b = h.add(20.0);
    let before = h.state();
    h.store.quietly(|s| {
        s.remove(a);
        s.remove(b);
    });
    h.snapshot();
    assert_eq!(h.store.len(), 1);

    h.history.undo(&mut h.store).unwrap();
    assert_eq!(h.state(), before);
    h.history.redo(&mut h.store).unwrap();
    assert_eq!(h.store.len(), 1);
}

#[test]
fn modify_undo_and_redo_use_replay() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    h.nudge(id, 5.0);
    h.history.flush_pending();
    let moved = h.state();

    h.history.undo(&mut h.store).unwrap();
    h.assert_consistent();
    h.history.redo(&mut h.store).unwrap();
    assert_eq!(h.state(), moved);
}

#[test]
fn corrupted_log_aborts_without_partial_state() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    h.nudge(id, 5.0);
    h.history.flush_pending();
    let live = h.state();
    h.history.log[0] = HistoryEntry {
        seq: h.history.log[0].seq,
        action: HistoryAction::Add { id, record: live[1].clone() },
    };

    assert_eq!(h.history.undo(&mut h.store), Err(HistoryError::NoSnapshot { index: 1 }));
    assert_eq!(h.state(), live);
    assert_eq!(h.history.index(), 2);
}

#[test]
fn replay_of_missing_object_is_reported() {
    let mut h = Harness::new(150, 50);
    let id = h.add(10.0);
    h.nudge(id, 5.0);
    h.history.flush_pending();
    h.history.log.remove(1);
    h.history.index = 1;
    assert_eq!(h.history.state_at(1), Err(HistoryError::MissingObject { id, index: 1 }));
}

// =============================================================
// Truncation, dirty tracking
// =============================================================

#[test]
fn new_action_mid_log_truncates_redo_branch() {
    let mut h = Harness::new(150, 50);
    for i in 0..9 {
        h.add(f64::from(i) * 10.0);
    }
    assert_eq!(h.history.len(), 10);
    for _ in 0..4 {
        h.history.undo(&mut h.store).unwrap();
    }
    assert_eq!(h.history.index(), 5);

    let fresh = h.add(500.0);
    assert_eq!(h.history.len(), 7);
    assert_eq!(h.history.index(), 6);
    assert!(matches!(h.history.entries()[6].action, HistoryAction::Add { id, .. } if id == fresh));
    assert_eq!(h.history.redo(&mut h.store), Ok(false));
}

#[test]
fn dirty_follows_saved_marker() {
    let mut h = Harness::new(150, 50);
    h.add(10.0);
    h.add(20.0);
    assert!(h.history.is_dirty());
    h.history.mark_saved(h.history.current_seq());
    assert!(!h.history.is_dirty());
    assert_eq!(h.history.last_saved_index(), Some(h.history.index()));
    h.history.undo(&mut h.store).unwrap();
    assert!(h.history.is_dirty());
    h.history.redo(&mut h.store).unwrap();
    assert!(!h.history.is_dirty());
}

#[test]
fn truncating_saved_entry_never_looks_clean() {
    let mut h = Harness::new(150, 50);
    h.add(10.0);
    h.add(20.0);
    h.history.mark_saved(h.history.current_seq());
    h.history.undo(&mut h.store).unwrap();
    h.add(30.0);
    assert_eq!(h.history.last_saved_index(), None);
    assert!(h.history.is_dirty());
    h.history.undo(&mut h.store).unwrap();
    assert!(h.history.is_dirty());
}

#[test]
fn reset_returns_to_clean_single_snapshot() {
    let mut h = Harness::new(150, 50);
    h.add(10.0);
    let state = h.state();
    h.history.reset(state);
    assert_eq!(h.history.len(), 1);
    assert!(!h.history.is_dirty());
}

// =============================================================
// Compaction
// =============================================================

#[test]
fn compaction_squashes_head_into_snapshot() {
    let mut h = Harness::new(10, 4);
    for i in 0..10 {
        h.add(f64::from(i) * 10.0);
    }
    assert_eq!(h.history.len(), 4);
    assert_eq!(h.history.index(), 3);
    assert!(matches!(h.history.entries()[0].action, HistoryAction::Snapshot { .. }));
    h.assert_consistent();

    let expected_base = {
        let mut ids = h.ids();
        ids.truncate(ids.len() - 3);
        ids
    };
    for _ in 0..3 {
        h.history.undo(&mut h.store).unwrap();
    }
    assert_eq!(h.ids(), expected_base);
    assert_eq!(h.history.undo(&mut h.store), Ok(false));
}

#[test]
fn compaction_keeps_saved_marker_of_surviving_state() {
    let mut h = Harness::new(10, 4);
    for i in 0..6 {
        h.add(f64::from(i));
    }
    h.history.mark_saved(h.history.current_seq());
    for i in 0..4 {
        h.add(f64::from(i));
    }
    assert_eq!(h.history.last_saved_index(), None, "saved entry was squashed away");
    assert!(h.history.is_dirty());
}

#[test]
fn compaction_base_inherits_stamp() {
    let mut h = Harness::new(10, 4);
    for i in 0..7 {
        h.add(f64::from(i));
    }
    h.history.mark_saved(h.history.current_seq());
    for i in 0..3 {
        h.add(f64::from(i));
    }
    assert_eq!(h.history.last_saved_index(), Some(0));
    for _ in 0..3 {
        h.history.undo(&mut h.store).unwrap();
    }
    assert!(!h.history.is_dirty());
}

// =============================================================
// Randomized
// =============================================================

fn random_session(seed: u64, steps: usize, cap: usize, keep: usize) -> Harness {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut h = Harness::new(cap, keep);
    for step in 0..steps {
        h.now = u64::try_from(step).unwrap() * 100;
        let live: Vec<ObjectId> = h.ids().into_iter().skip(1).collect();
        match rng.random_range(0..10) {
            0..=3 => {
                h.add(rng.random_range(0.0..900.0));
            }
            4..=5 if !live.is_empty() => {
                let id = live[rng.random_range(0..live.len())];
                h.remove(id);
            }
            6..=8 if !live.is_empty() => {
                let id = live[rng.random_range(0..live.len())];
                h.nudge(id, rng.random_range(-20.0..20.0));
                if rng.random_bool(0.5) {
                    h.history.flush_pending();
                }
            }
            _ => h.snapshot(),
        }
        if !h.history.has_pending() {
            h.assert_consistent();
        }
    }
    h.history.flush_pending();
    h.assert_consistent();
    h
}

#[test]
fn randomized_undo_all_then_redo_all_round_trips() {
    for seed in 0..8 {
        let mut h = random_session(seed, 60, 1000, 500);
        let end_state = h.state();
        let steps = h.history.index();
        for _ in 0..steps {
            assert_eq!(h.history.undo(&mut h.store), Ok(true));
            h.assert_consistent();
        }
        assert_eq!(h.store.len(), 1, "only the background remains at the base");
        for _ in 0..steps {
            assert_eq!(h.history.redo(&mut h.store), Ok(true));
            h.assert_consistent();
        }
        assert_eq!(h.state(), end_state, "seed {seed}");
    }
}

#[test]
fn randomized_compaction_preserves_reachable_states() {
    for seed in 100..106 {
        let mut h = random_session(seed, 200, 40, 15);
        assert!(h.history.len() <= 40);
        let mut states = vec![h.state()];
        while h.history.undo(&mut h.store).unwrap() {
            h.assert_consistent();
            states.push(h.state());
        }
        states.pop();
        states.reverse();
        for expected in states {
            h.history.redo(&mut h.store).unwrap();
            assert_eq!(h.state(), expected, "seed {seed}");
        }
    }
}
