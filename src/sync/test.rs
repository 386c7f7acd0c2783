use super::*;

use crate::config::SyncConfig;
use crate::grid::model::Row;
use crate::grid::Snapshot;
use crate::sync::reconciler::SyncState;

fn config() -> SyncConfig {
    SyncConfig {
        debounce_ms: 800,
        echo_grace_ms: 3_000,
        suppression_margin_ms: 5_000,
        stale_margin_ms: 500,
        destructive_tolerance: 3,
    }
}

/// A one-column snapshot with `filled` non-empty cells out of `rows`
fn snapshot(filled: usize, rows: usize) -> Snapshot {
    let rows = (0..rows)
        .map(|i| {
            let mut row = Row::new();
            let value = if i < filled { format!("v{}", i) } else { String::new() };
            row.insert("A".to_string(), value);
            row
        })
        .collect();
    Snapshot::new("doc", vec!["A".to_string()], rows)
}

/// Reconciler that has completed one save at t=10_000 and is now well past every window
fn settled() -> (Reconciler, u64) {
    let mut reconciler = Reconciler::new(config());
    let seq = reconciler.begin_save(snapshot(5, 20).fingerprint(), false, 10_000);
    reconciler.complete_save(seq, 10_000, 10_000);
    (reconciler, 30_000)
}

#[test]
fn test_newer_nondestructive_candidate_applies() {
    let (mut reconciler, now) = settled();
    let candidate = snapshot(6, 20);
    assert_eq!(reconciler.evaluate(&candidate, 20_000, 5, now), Verdict::Apply);
}

#[test]
fn test_empty_candidate_over_filled_grid_is_destructive() {
    let (mut reconciler, now) = settled();
    let candidate = snapshot(0, 20);

    let verdict = reconciler.evaluate(&candidate, 20_000, 5, now);
    assert_eq!(verdict, Verdict::Reject(Rejection::Destructive { local: 5, remote: 0 }));
}

#[test]
fn test_destructive_rejection_extends_suppression() {
    let (mut reconciler, now) = settled();
    reconciler.evaluate(&snapshot(0, 20), 20_000, 5, now);
    assert_eq!(reconciler.state().suppress_until, now + 5_000);

    // a perfectly good candidate right after is still held off
    let verdict = reconciler.evaluate(&snapshot(6, 20), 21_000, 5, now + 100);
    assert_eq!(verdict, Verdict::Reject(Rejection::Suppressed));
}

#[test]
fn test_losing_more_than_tolerance_is_destructive() {
    let (mut reconciler, now) = settled();
    // 10 local, 6 remote: 6 + 3 < 10
    assert!(matches!(
        reconciler.evaluate(&snapshot(6, 20), 20_000, 10, now),
        Verdict::Reject(Rejection::Destructive { local: 10, remote: 6 })
    ));
    // 10 local, 7 remote: within tolerance
    let (mut reconciler, now) = settled();
    assert_eq!(reconciler.evaluate(&snapshot(7, 20), 20_000, 10, now), Verdict::Apply);
}

#[test]
fn test_empty_local_grid_accepts_anything_newer() {
    let (mut reconciler, now) = settled();
    assert_eq!(reconciler.evaluate(&snapshot(0, 20), 20_000, 0, now), Verdict::Apply);
}

#[test]
fn test_candidate_within_echo_grace_is_rejected() {
    let mut reconciler = Reconciler::new(SyncConfig { suppression_margin_ms: 0, ..config() });
    let seq = reconciler.begin_save(snapshot(5, 20).fingerprint(), false, 10_000);
    reconciler.complete_save(seq, 10_000, 10_000);

    let verdict = reconciler.evaluate(&snapshot(8, 20), 12_000, 5, 12_000);
    assert_eq!(verdict, Verdict::Reject(Rejection::EchoGrace));
}

#[test]
fn test_candidate_inside_suppression_window_is_rejected() {
    let mut reconciler = Reconciler::new(config());
    let seq = reconciler.begin_save(snapshot(5, 20).fingerprint(), false, 10_000);
    reconciler.complete_save(seq, 10_000, 10_000);

    // past the grace period but still inside the post-save margin
    let verdict = reconciler.evaluate(&snapshot(8, 20), 14_000, 5, 14_000);
    assert_eq!(verdict, Verdict::Reject(Rejection::Suppressed));
}

#[test]
fn test_echo_of_last_save_is_rejected() {
    let (mut reconciler, now) = settled();
    let verdict = reconciler.evaluate(&snapshot(5, 20), 20_000, 5, now);
    assert_eq!(verdict, Verdict::Reject(Rejection::OwnWrite));
}

#[test]
fn test_echo_of_in_flight_save_is_rejected() {
    let (mut reconciler, now) = settled();
    let pending = snapshot(9, 20);
    reconciler.begin_save(pending.fingerprint(), false, now);

    let verdict = reconciler.evaluate(&pending, 40_000, 5, now);
    assert_eq!(verdict, Verdict::Reject(Rejection::OwnWrite));
}

#[test]
fn test_stale_candidate_is_rejected() {
    let (mut reconciler, now) = settled();
    // last local save was at 10_000; margin is 500
    assert_eq!(
        reconciler.evaluate(&snapshot(6, 20), 10_500, 5, now),
        Verdict::Reject(Rejection::Stale)
    );
    assert_eq!(reconciler.evaluate(&snapshot(6, 20), 10_501, 5, now), Verdict::Apply);
}

#[test]
fn test_applied_remote_raises_staleness_bar() {
    let (mut reconciler, now) = settled();
    let first = snapshot(6, 20);
    assert_eq!(reconciler.evaluate(&first, 20_000, 5, now), Verdict::Apply);
    reconciler.record_applied(20_000, first.fingerprint());

    assert_eq!(
        reconciler.evaluate(&snapshot(7, 20), 19_000, 6, now),
        Verdict::Reject(Rejection::Stale)
    );
    // the same content delivered twice is not applied twice
    assert_eq!(
        reconciler.evaluate(&first, 25_000, 6, now),
        Verdict::Reject(Rejection::OwnWrite)
    );
}

#[test]
fn test_immediate_save_suppresses_before_completion() {
    let (mut reconciler, now) = settled();
    reconciler.begin_save(snapshot(5, 21).fingerprint(), true, now);
    assert_eq!(reconciler.state().suppress_until, now + 5_000);
    assert_eq!(
        reconciler.evaluate(&snapshot(6, 20), 40_000, 5, now + 1),
        Verdict::Reject(Rejection::Suppressed)
    );
}

#[test]
fn test_out_of_order_completion_keeps_newest_fingerprint() {
    let mut reconciler = Reconciler::new(config());
    let older = snapshot(1, 20).fingerprint();
    let newer = snapshot(2, 20).fingerprint();
    let first = reconciler.begin_save(older, false, 1_000);
    let second = reconciler.begin_save(newer, false, 1_100);

    reconciler.complete_save(second, 1_200, 1_200);
    reconciler.complete_save(first, 1_150, 1_300);

    let state = reconciler.state();
    assert_eq!(state.last_saved_fingerprint, Some(newer));
    assert_eq!(state.last_local_save, 1_200);
    assert_eq!(state.last_local_save_at, 1_300);
    assert_eq!(reconciler.saves_in_flight(), 0);
}

#[test]
fn test_failed_save_drops_in_flight_fingerprint() {
    let mut reconciler = Reconciler::new(config());
    let pending = snapshot(4, 20);
    let seq = reconciler.begin_save(pending.fingerprint(), false, 1_000);
    reconciler.fail_save(seq);

    assert_eq!(reconciler.saves_in_flight(), 0);
    assert_eq!(reconciler.evaluate(&pending, 5_000, 0, 20_000), Verdict::Apply);
}

#[test]
fn test_reset_ignores_completions_from_previous_document() {
    let mut reconciler = Reconciler::new(config());
    let seq = reconciler.begin_save(snapshot(3, 20).fingerprint(), false, 1_000);
    reconciler.reset();
    reconciler.complete_save(seq, 2_000, 2_000);

    assert_eq!(reconciler.state(), &SyncState::default());
}

#[test]
fn test_seed_loaded_sets_baseline() {
    let mut reconciler = Reconciler::new(config());
    let loaded = snapshot(3, 20);
    reconciler.seed_loaded(50_000, loaded.fingerprint());

    assert_eq!(
        reconciler.evaluate(&snapshot(4, 20), 50_200, 3, 60_000),
        Verdict::Reject(Rejection::Stale)
    );
    assert_eq!(reconciler.evaluate(&snapshot(4, 20), 51_000, 3, 60_000), Verdict::Apply);
}

// === scheduler ===

#[test]
fn test_debounce_resets_on_each_mutation() {
    let mut scheduler = SaveScheduler::new(800);
    assert!(!scheduler.mark_dirty(SaveMode::Debounced, 1_000));
    assert!(!scheduler.mark_dirty(SaveMode::Debounced, 1_500));

    assert!(!scheduler.take_due(2_000));
    assert!(scheduler.take_due(2_300));
    assert!(!scheduler.take_due(5_000));
}

#[test]
fn test_immediate_mode_asks_for_save_now() {
    let mut scheduler = SaveScheduler::new(800);
    assert!(scheduler.mark_dirty(SaveMode::Immediate, 1_000));
    assert_eq!(scheduler.deadline(), None);
}

#[test]
fn test_save_covers_pending_debounce() {
    let mut scheduler = SaveScheduler::new(800);
    scheduler.mark_dirty(SaveMode::Debounced, 1_000);
    scheduler.mark_dirty(SaveMode::Immediate, 1_100);
    let revision = scheduler.begin_save(true);

    assert!(!scheduler.take_due(10_000));
    scheduler.finish_save(revision, true, Ok(()));
    assert_eq!(scheduler.status(), SaveStatus::Saved);
}

#[test]
fn test_status_transitions() {
    let mut scheduler = SaveScheduler::new(800);
    assert_eq!(scheduler.status(), SaveStatus::Saved);

    scheduler.mark_dirty(SaveMode::Debounced, 0);
    assert_eq!(scheduler.status(), SaveStatus::Unsaved);

    let revision = scheduler.begin_save(false);
    assert_eq!(scheduler.status(), SaveStatus::Saving);

    scheduler.finish_save(revision, false, Err("offline".to_string()));
    assert_eq!(scheduler.status(), SaveStatus::Failed("offline".to_string()));

    let revision = scheduler.begin_save(false);
    scheduler.finish_save(revision, false, Ok(()));
    assert_eq!(scheduler.status(), SaveStatus::Saved);
}

#[test]
fn test_silent_save_does_not_show_saving() {
    let mut scheduler = SaveScheduler::new(800);
    scheduler.mark_dirty(SaveMode::Immediate, 0);
    scheduler.begin_save(true);
    assert_eq!(scheduler.status(), SaveStatus::Unsaved);
}

#[test]
fn test_edits_during_save_stay_dirty() {
    let mut scheduler = SaveScheduler::new(800);
    scheduler.mark_dirty(SaveMode::Debounced, 0);
    let revision = scheduler.begin_save(false);
    scheduler.mark_dirty(SaveMode::Debounced, 100);
    scheduler.finish_save(revision, false, Ok(()));

    assert!(scheduler.is_dirty());
    assert_eq!(scheduler.status(), SaveStatus::Unsaved);
}
