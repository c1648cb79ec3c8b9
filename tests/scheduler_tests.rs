//! Scheduler Tests
//!
//! Tests for:
//! - Regular events firing on every wake, periodic events firing once per
//!   accumulated period with remainder carry-over
//! - Priority-grouped execution and shared per-wake time snapshots
//! - Registration semantics: re-registration moves, zero period degenerates,
//!   callbacks may re-register
//! - The dedicated timing thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use vidmix_core::schedule::EventRef;
use vidmix_core::{Scheduler, TimeSnapshot, Updatable};

#[derive(Default)]
struct Counter {
    count: AtomicUsize,
}

impl Counter {
    fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Updatable for Counter {
    fn update(&self, _time: &TimeSnapshot) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records begin/end markers so tests can assert group completion order.
struct Tracer {
    id: u32,
    log: Arc<Mutex<Vec<(u32, &'static str)>>>,
}

impl Updatable for Tracer {
    fn update(&self, _time: &TimeSnapshot) {
        self.log.lock().push((self.id, "begin"));
        self.log.lock().push((self.id, "end"));
    }
}

/// Stores the snapshot it was invoked with.
#[derive(Default)]
struct SnapshotProbe {
    seen: Mutex<Vec<TimeSnapshot>>,
}

impl Updatable for SnapshotProbe {
    fn update(&self, time: &TimeSnapshot) {
        self.seen.lock().push(*time);
    }
}

const MS: Duration = Duration::from_millis(1);

// ============================================================================
// Regular and periodic firing
// ============================================================================

#[test]
fn regular_event_fires_every_wake() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(Counter::default());
    scheduler.add_event(counter.clone(), 0, None);

    for _ in 0..3 {
        assert_eq!(scheduler.step(16 * MS), 1);
    }
    assert_eq!(counter.get(), 3);
    assert_eq!(scheduler.tick(), 3);
    assert_eq!(scheduler.elapsed(), 48 * MS);
}

#[test]
fn periodic_event_fires_floor_of_elapsed_over_period() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(Counter::default());
    scheduler.add_event(counter.clone(), 0, Some(100 * MS));

    // One oversized wake catches up: two whole periods elapsed.
    scheduler.step(250 * MS);
    assert_eq!(counter.get(), 2);

    // 50ms carried over; 49 more is still short of a period.
    scheduler.step(49 * MS);
    assert_eq!(counter.get(), 2);

    // The final millisecond completes the third period.
    scheduler.step(MS);
    assert_eq!(counter.get(), 3);
}

#[test]
fn periodic_remainder_carries_between_wakes() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(Counter::default());
    scheduler.add_event(counter.clone(), 0, Some(100 * MS));

    scheduler.step(150 * MS);
    assert_eq!(counter.get(), 1);
    // 50ms remainder: this wake reaches exactly 200ms total.
    scheduler.step(50 * MS);
    assert_eq!(counter.get(), 2);
}

#[test]
fn distinct_periods_accumulate_independently() {
    let scheduler = Scheduler::new();
    let fast = Arc::new(Counter::default());
    let slow = Arc::new(Counter::default());
    scheduler.add_event(fast.clone(), 0, Some(10 * MS));
    scheduler.add_event(slow.clone(), 0, Some(30 * MS));

    for _ in 0..6 {
        scheduler.step(10 * MS);
    }
    assert_eq!(fast.get(), 6);
    assert_eq!(slow.get(), 2);
}

// ============================================================================
// Ordering and snapshots
// ============================================================================

#[test]
fn priority_groups_complete_in_ascending_order() {
    let scheduler = Scheduler::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    // Registered out of order on purpose.
    for id in [1u32, 0, 2] {
        scheduler.add_event(
            Arc::new(Tracer {
                id,
                log: Arc::clone(&log),
            }),
            id,
            None,
        );
    }

    scheduler.step(16 * MS);
    assert_eq!(
        *log.lock(),
        vec![
            (0, "begin"),
            (0, "end"),
            (1, "begin"),
            (1, "end"),
            (2, "begin"),
            (2, "end"),
        ],
        "a priority group finishes before the next begins"
    );
}

#[test]
fn all_events_of_one_wake_share_a_snapshot() {
    let scheduler = Scheduler::new();
    let regular = Arc::new(SnapshotProbe::default());
    let periodic = Arc::new(SnapshotProbe::default());
    scheduler.add_event(regular.clone(), 0, None);
    scheduler.add_event(periodic.clone(), 1, Some(10 * MS));

    scheduler.step(10 * MS);
    scheduler.step(10 * MS);

    let regular_seen = regular.seen.lock().clone();
    let periodic_seen = periodic.seen.lock().clone();
    assert_eq!(regular_seen.len(), 2);
    assert_eq!(regular_seen, periodic_seen, "same wake, same snapshot");
    assert_eq!(regular_seen[1].elapsed, 20 * MS);
    assert_eq!(regular_seen[1].tick, 2);
}

// ============================================================================
// Registration semantics
// ============================================================================

#[test]
fn reregistration_moves_the_event() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(Counter::default());
    let event: EventRef = counter.clone();

    scheduler.add_event(Arc::clone(&event), 0, Some(100 * MS));
    scheduler.add_event(Arc::clone(&event), 0, None);

    // Were both registrations live, a 100ms wake would invoke it twice.
    scheduler.step(100 * MS);
    assert_eq!(counter.get(), 1);
}

#[test]
fn zero_period_degenerates_to_regular() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(Counter::default());
    scheduler.add_event(counter.clone(), 0, Some(Duration::ZERO));

    scheduler.step(MS);
    assert_eq!(counter.get(), 1, "fires every wake, not never");
}

#[test]
fn removed_event_stops_firing() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(Counter::default());
    let event: EventRef = counter.clone();

    scheduler.add_event(Arc::clone(&event), 0, None);
    scheduler.step(MS);
    scheduler.remove_event(&event);
    scheduler.step(MS);
    assert_eq!(counter.get(), 1);

    // Removing again is a no-op.
    scheduler.remove_event(&event);
}

struct Registrar {
    scheduler: Arc<Scheduler>,
    child: EventRef,
    registered: AtomicBool,
}

impl Updatable for Registrar {
    fn update(&self, _time: &TimeSnapshot) {
        if !self.registered.swap(true, Ordering::SeqCst) {
            self.scheduler.add_event(Arc::clone(&self.child), 0, None);
        }
    }
}

#[test]
fn callbacks_may_register_events() {
    let scheduler = Arc::new(Scheduler::new());
    let counter = Arc::new(Counter::default());
    let registrar = Arc::new(Registrar {
        scheduler: Arc::clone(&scheduler),
        child: counter.clone(),
        registered: AtomicBool::new(false),
    });
    scheduler.add_event(registrar, 0, None);

    // First wake runs the registrar only; the child was not yet due.
    assert_eq!(scheduler.step(MS), 1);
    assert_eq!(counter.get(), 0);
    assert_eq!(scheduler.step(MS), 2);
    assert_eq!(counter.get(), 1);
}

// ============================================================================
// Timing thread
// ============================================================================

#[test]
fn timing_thread_drives_periodic_events() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scheduler = Scheduler::new();
    let counter = Arc::new(Counter::default());
    scheduler.add_event(counter.clone(), 0, Some(10 * MS));

    scheduler.start().unwrap();
    // Idempotent while running.
    scheduler.start().unwrap();
    std::thread::sleep(100 * MS);
    scheduler.stop();

    let fired = counter.get();
    assert!(fired >= 3, "expected several periodic fires, got {fired}");

    // Stopped: nothing fires anymore.
    std::thread::sleep(30 * MS);
    assert_eq!(counter.get(), fired);
}

#[test]
fn registration_wakes_an_idle_timing_thread() {
    let scheduler = Scheduler::new();
    scheduler.start().unwrap();

    // The loop is blocked with no deadline; registering must wake it.
    std::thread::sleep(20 * MS);
    let counter = Arc::new(Counter::default());
    scheduler.add_event(counter.clone(), 0, Some(10 * MS));
    std::thread::sleep(80 * MS);
    scheduler.stop();

    assert!(counter.get() >= 1, "idle loop picked up the new deadline");
}
