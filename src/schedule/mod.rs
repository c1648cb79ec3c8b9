//! Multi-rate update scheduling.
//!
//! The [`Scheduler`] drives the dataflow graph: *regular* events run on every
//! wake, *periodic* events run once their accumulated logical time reaches
//! their period, tracked independently per distinct period value. Within one
//! wake all due events execute grouped by ascending priority, and every
//! invocation receives the same [`TimeSnapshot`].
//!
//! Periodic accumulators are decremented by exactly one period per fire,
//! never reset, so overshoot carries into the next wake instead of drifting;
//! a period shorter than the achievable wake resolution catches up rather
//! than starving.
//!
//! Wakes are produced either by the dedicated timing thread
//! ([`start`](Scheduler::start)) or by a host that owns its own frame loop
//! ([`step`](Scheduler::step)).

pub mod clock;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::trace;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::errors::Result;

pub use clock::{SchedulerClock, TimeSnapshot};

// ============================================================================
// Events
// ============================================================================

/// A scheduled callback. Implemented by graph producers/consumers; invoked on
/// the scheduler thread, run to completion, never preempted by another
/// scheduled callback.
pub trait Updatable: Send + Sync {
    fn update(&self, time: &TimeSnapshot);
}

/// Shared handle to a scheduled event. Registration identity is the
/// allocation, compared by `Arc::ptr_eq`.
pub type EventRef = Arc<dyn Updatable>;

struct Registration {
    event: EventRef,
    /// Ordering key; lower runs first.
    priority: u32,
}

struct PeriodicBucket {
    /// Logical time accumulated since the last fire.
    accumulated: Duration,
    entries: Vec<Registration>,
}

// ============================================================================
// Registry state
// ============================================================================

struct SchedulerState {
    regular: Vec<Registration>,
    periodic: FxHashMap<Duration, PeriodicBucket>,
    clock: SchedulerClock,
    running: bool,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            regular: Vec::new(),
            periodic: FxHashMap::default(),
            clock: SchedulerClock::new(),
            running: false,
        }
    }

    /// Removes every registration of `event`. Buckets that drain to empty are
    /// dropped from the map.
    fn remove(&mut self, event: &EventRef) {
        self.regular.retain(|r| !Arc::ptr_eq(&r.event, event));
        self.periodic.retain(|_, bucket| {
            bucket.entries.retain(|r| !Arc::ptr_eq(&r.event, event));
            !bucket.entries.is_empty()
        });
    }

    /// Minimum remaining time to the next periodic deadline, or `None` when
    /// nothing periodic is scheduled.
    fn next_deadline(&self) -> Option<Duration> {
        self.periodic
            .iter()
            .map(|(period, bucket)| period.saturating_sub(bucket.accumulated))
            .min()
    }

    /// Advances the clock by `dt` and collects everything due, ordered by
    /// ascending priority.
    fn collect_pending(&mut self, dt: Duration) -> (TimeSnapshot, Vec<(u32, EventRef)>) {
        let snapshot = self.clock.advance(dt);

        let mut pending: Vec<(u32, EventRef)> = self
            .regular
            .iter()
            .map(|r| (r.priority, Arc::clone(&r.event)))
            .collect();

        for (period, bucket) in &mut self.periodic {
            bucket.accumulated += dt;
            // Decrement, never reset: each whole period that elapsed fires
            // once, and the remainder carries over.
            while bucket.accumulated >= *period {
                for r in &bucket.entries {
                    pending.push((r.priority, Arc::clone(&r.event)));
                }
                bucket.accumulated -= *period;
            }
        }

        // Stable: registration order is preserved within a priority group.
        pending.sort_by_key(|(priority, _)| *priority);
        (snapshot, pending)
    }
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    wake: Condvar,
}

// ============================================================================
// Scheduler
// ============================================================================

/// The update scheduler: two registries and a timing loop.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                state: Mutex::new(SchedulerState::new()),
                wake: Condvar::new(),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Registers `event` under `priority`, regular (`None`) or periodic
    /// (`Some(period)`).
    ///
    /// An event is registered under at most one (period, priority) bucket:
    /// re-registering first removes the previous registration. A zero period
    /// degenerates to a regular registration. Safe to call from a running
    /// callback; the change takes effect from the next wake.
    pub fn add_event(&self, event: EventRef, priority: u32, period: Option<Duration>) {
        {
            let mut state = self.shared.state.lock();
            state.remove(&event);
            match period {
                Some(period) if !period.is_zero() => {
                    trace!("registering periodic event, period {period:?}, priority {priority}");
                    state
                        .periodic
                        .entry(period)
                        .or_insert_with(|| PeriodicBucket {
                            accumulated: Duration::ZERO,
                            entries: Vec::new(),
                        })
                        .entries
                        .push(Registration { event, priority });
                }
                _ => {
                    trace!("registering regular event, priority {priority}");
                    state.regular.push(Registration { event, priority });
                }
            }
        }
        // A new deadline may be earlier than the one the loop is sleeping on.
        self.shared.wake.notify_all();
    }

    /// Deregisters `event` everywhere. Removing an unregistered event is a
    /// no-op.
    pub fn remove_event(&self, event: &EventRef) {
        self.shared.state.lock().remove(event);
        self.shared.wake.notify_all();
    }

    /// Drives one wake with an explicit elapsed time, executing every due
    /// event on the calling thread. For hosts that own their frame loop.
    ///
    /// Returns the number of invocations performed.
    pub fn step(&self, dt: Duration) -> usize {
        let (snapshot, pending) = self.shared.state.lock().collect_pending(dt);
        let count = pending.len();
        // The registry mutex is released here: callbacks may re-register.
        for (_, event) in pending {
            event.update(&snapshot);
        }
        count
    }

    /// Total logical time advanced so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.shared.state.lock().clock.elapsed()
    }

    /// Number of wakes so far.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.shared.state.lock().clock.tick()
    }

    /// Spawns the dedicated timing thread. Idempotent while running.
    pub fn start(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }
        self.shared.state.lock().running = true;
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("vidmix-scheduler".into())
            .spawn(move || run_loop(&shared))?;
        *thread = Some(handle);
        Ok(())
    }

    /// Stops the timing thread and joins it. Safe to call when not running.
    pub fn stop(&self) {
        self.shared.state.lock().running = false;
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Timing loop
// ============================================================================

fn run_loop(shared: &SchedulerShared) {
    let mut last = Instant::now();
    loop {
        {
            let mut state = shared.state.lock();
            if !state.running {
                return;
            }
            match state.next_deadline() {
                None => {
                    // Nothing periodic scheduled: block until a registration
                    // or shutdown wakes us. Blocked time is not logical time.
                    shared.wake.wait(&mut state);
                    if !state.running {
                        return;
                    }
                    last = Instant::now();
                    continue;
                }
                Some(remaining) if !remaining.is_zero() => {
                    // Sleep to the earliest deadline; an event registration
                    // may signal the condition and wake us early.
                    let _ = shared.wake.wait_for(&mut state, remaining);
                    if !state.running {
                        return;
                    }
                }
                Some(_) => {}
            }
        }

        let now = Instant::now();
        let dt = now - last;
        last = now;

        let (snapshot, pending) = shared.state.lock().collect_pending(dt);
        for (_, event) in pending {
            event.update(&snapshot);
        }
    }
}
