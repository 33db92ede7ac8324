//! Refresh scheduling and the single-pass guard
//!
//! A background timer (or the host) raises the "anchors need refresh" flag
//! through a [`RefreshHandle`]; the frame driver consumes it by entering a
//! pass. Entering is a compare-and-swap on the "refreshing" flag, so at most
//! one pass is ever in flight and extra requests are coalesced.

use crate::utils::config::PlacementConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Time source for the refresh scheduler
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock advanced by hand, for tests and replays
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
struct RefreshFlags {
    anchors_need_refresh: AtomicBool,
    refreshing: AtomicBool,
}

/// Shared access to an engine's refresh flags
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    flags: Arc<RefreshFlags>,
}

/// Result of trying to enter a placement pass
#[derive(Debug)]
pub enum PassEntry {
    /// No refresh was requested
    Idle,
    /// Another pass is in flight
    Busy,
    /// The pass may run until the guard is dropped
    Entered(PassGuard),
}

impl RefreshHandle {
    /// New flags with a refresh already requested
    pub fn new() -> Self {
        Self {
            flags: Arc::new(RefreshFlags {
                anchors_need_refresh: AtomicBool::new(true),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Ask for a placement pass on the next frame
    pub fn request_refresh(&self) {
        self.flags.anchors_need_refresh.store(true, Ordering::Release);
    }

    pub fn needs_refresh(&self) -> bool {
        self.flags.anchors_need_refresh.load(Ordering::Acquire)
    }

    pub fn is_refreshing(&self) -> bool {
        self.flags.refreshing.load(Ordering::Acquire)
    }

    /// Enter a pass if one was requested and none is running.
    ///
    /// Entering consumes the pending request.
    pub fn try_begin_pass(&self) -> PassEntry {
        if !self.needs_refresh() {
            return PassEntry::Idle;
        }
        if self
            .flags
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return PassEntry::Busy;
        }
        self.flags.anchors_need_refresh.store(false, Ordering::Release);
        PassEntry::Entered(PassGuard {
            flags: Arc::clone(&self.flags),
        })
    }
}

impl Default for RefreshHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks a pass in flight; clears the refreshing flag when dropped
#[derive(Debug)]
pub struct PassGuard {
    flags: Arc<RefreshFlags>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.flags.refreshing.store(false, Ordering::Release);
    }
}

/// Snapshot of an engine's refresh bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefreshState {
    pub interval: Duration,
    pub calibration_iteration: u32,
    pub refreshing: bool,
    pub anchors_need_refresh: bool,
    pub current_distance_group: i32,
}

/// Clock-driven periodic refresh with calibration back-off.
///
/// Every elapsed tick requests a refresh and advances the calibration counter.
/// Once the counter reaches the configured number of iterations, the interval
/// becomes the base interval times the calibrated factor. The refresh requested
/// on start is not a tick, so stopping and restarting never advances calibration.
pub struct RefreshScheduler {
    clock: Arc<dyn Clock>,
    base_interval: Duration,
    interval: Duration,
    iteration: u32,
    calibration_iterations: u32,
    calibrated_factor: u32,
    continuous: bool,
    last_fired: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(config: &PlacementConfig, clock: Arc<dyn Clock>) -> Self {
        let base_interval = config.base_refresh_interval();
        Self {
            clock,
            base_interval,
            interval: base_interval,
            iteration: 0,
            calibration_iterations: config.calibration_iterations,
            calibrated_factor: config.calibrated_interval_factor,
            continuous: config.continuous_marker_refresh,
            last_fired: None,
        }
    }

    /// Start ticking, requesting a refresh right away
    pub fn start(&mut self, handle: &RefreshHandle) {
        handle.request_refresh();
        self.last_fired = Some(self.clock.now());
        log::trace!("refresh scheduler started, next in {:?}", self.interval);
    }

    /// Stop ticking; calibration progress is kept
    pub fn stop(&mut self) {
        self.last_fired = None;
    }

    pub fn is_running(&self) -> bool {
        self.last_fired.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn is_calibrated(&self) -> bool {
        self.iteration >= self.calibration_iterations
    }

    /// Restart calibration from the base interval
    pub fn reset_calibration(&mut self) {
        self.iteration = 0;
        self.interval = self.base_interval;
    }

    /// Fire if the current interval has elapsed; returns whether it fired
    pub fn tick(&mut self, handle: &RefreshHandle) -> bool {
        let Some(last_fired) = self.last_fired else {
            return false;
        };
        if self.clock.now().saturating_duration_since(last_fired) < self.interval {
            return false;
        }
        self.fire(handle);
        true
    }

    /// Time left until the next tick fires, `None` when stopped
    pub fn time_until_next(&self) -> Option<Duration> {
        let last_fired = self.last_fired?;
        let elapsed = self.clock.now().saturating_duration_since(last_fired);
        Some(self.interval.saturating_sub(elapsed))
    }

    fn fire(&mut self, handle: &RefreshHandle) {
        handle.request_refresh();
        if !self.continuous {
            if self.iteration < self.calibration_iterations {
                self.iteration += 1;
            }
            self.interval = if self.is_calibrated() {
                self.base_interval * self.calibrated_factor
            } else {
                self.base_interval
            };
        }
        self.last_fired = Some(self.clock.now());
        log::trace!(
            "refresh requested, calibration {}/{}, next in {:?}",
            self.iteration,
            self.calibration_iterations,
            self.interval
        );
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("interval", &self.interval)
            .field("iteration", &self.iteration)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Scheduler shared between its owner and a background timer
pub type SharedScheduler = Arc<Mutex<RefreshScheduler>>;

/// Lock a shared scheduler, recovering it if a holder panicked
pub fn lock_scheduler(scheduler: &Mutex<RefreshScheduler>) -> MutexGuard<'_, RefreshScheduler> {
    scheduler.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Background thread driving a [`RefreshScheduler`]
#[derive(Debug)]
pub struct RefreshTimer {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Upper bound on how long the timer thread sleeps between checks
const TIMER_POLL: Duration = Duration::from_millis(50);

/// Tick a shared scheduler on its own thread, for hosts without a ticking frame driver.
///
/// The scheduler is started if it is not running yet. Stopping the timer
/// leaves the scheduler with its owner, calibration intact.
pub fn spawn_refresh_timer(scheduler: SharedScheduler, handle: RefreshHandle) -> RefreshTimer {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = thread::spawn(move || {
        {
            let mut scheduler = lock_scheduler(&scheduler);
            if !scheduler.is_running() {
                scheduler.start(&handle);
            }
        }
        while !stop_flag.load(Ordering::Acquire) {
            let wait = {
                let mut scheduler = lock_scheduler(&scheduler);
                scheduler.tick(&handle);
                scheduler.time_until_next().unwrap_or(TIMER_POLL).min(TIMER_POLL)
            };
            thread::sleep(wait.max(Duration::from_millis(1)));
        }
        log::debug!("refresh timer stopped");
    });

    RefreshTimer {
        stop,
        thread: Some(thread),
    }
}

impl RefreshTimer {
    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("refresh timer thread panicked");
            }
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(config: &PlacementConfig) -> (RefreshScheduler, ManualClock) {
        let clock = ManualClock::new();
        (RefreshScheduler::new(config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_pass_guard_clears_flag() {
        let handle = RefreshHandle::new();
        assert!(handle.needs_refresh());

        let guard = match handle.try_begin_pass() {
            PassEntry::Entered(guard) => guard,
            other => panic!("expected to enter, got {:?}", other),
        };
        assert!(handle.is_refreshing());
        assert!(!handle.needs_refresh());

        drop(guard);
        assert!(!handle.is_refreshing());
        assert!(matches!(handle.try_begin_pass(), PassEntry::Idle));
    }

    #[test]
    fn test_requests_during_pass_are_coalesced() {
        let handle = RefreshHandle::new();
        let guard = match handle.try_begin_pass() {
            PassEntry::Entered(guard) => guard,
            other => panic!("expected to enter, got {:?}", other),
        };

        handle.request_refresh();
        handle.request_refresh();
        assert!(matches!(handle.try_begin_pass(), PassEntry::Busy));

        drop(guard);
        assert!(matches!(handle.try_begin_pass(), PassEntry::Entered(_)));
        assert!(matches!(handle.try_begin_pass(), PassEntry::Idle));
    }

    #[test]
    fn test_single_pass_across_threads() {
        let handle = RefreshHandle::new();
        let entered: usize = (0..8)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || matches!(handle.try_begin_pass(), PassEntry::Entered(_)))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|thread| thread.join().unwrap())
            .filter(|entered| *entered)
            .count();
        assert_eq!(entered, 1);
    }

    #[test]
    fn test_calibration_back_off() {
        let config = PlacementConfig::default();
        let (mut scheduler, clock) = scheduler(&config);
        let handle = RefreshHandle::new();

        assert!(!scheduler.tick(&handle));
        scheduler.start(&handle);
        assert_eq!(scheduler.iteration(), 0);
        assert_eq!(scheduler.interval(), Duration::from_secs(2));

        clock.advance(Duration::from_millis(1_999));
        assert!(!scheduler.tick(&handle));
        clock.advance(Duration::from_millis(1));
        assert!(scheduler.tick(&handle));
        assert_eq!(scheduler.iteration(), 1);
        assert_eq!(scheduler.interval(), Duration::from_secs(2));

        clock.advance(Duration::from_secs(2));
        assert!(scheduler.tick(&handle));
        assert!(!scheduler.is_calibrated());

        clock.advance(Duration::from_secs(2));
        assert!(scheduler.tick(&handle));
        assert!(scheduler.is_calibrated());
        assert_eq!(scheduler.interval(), Duration::from_secs(20));

        // The back-off does not compound
        clock.advance(Duration::from_secs(20));
        assert!(scheduler.tick(&handle));
        assert_eq!(scheduler.iteration(), 3);
        assert_eq!(scheduler.interval(), Duration::from_secs(20));
    }

    #[test]
    fn test_restarts_do_not_advance_calibration() {
        let (mut scheduler, _clock) = scheduler(&PlacementConfig::default());
        let handle = RefreshHandle::new();

        for _ in 0..5 {
            scheduler.start(&handle);
            scheduler.stop();
        }
        scheduler.start(&handle);
        assert!(handle.needs_refresh());
        assert_eq!(scheduler.iteration(), 0);
        assert_eq!(scheduler.interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_continuous_refresh_skips_back_off() {
        let config = PlacementConfig {
            continuous_marker_refresh: true,
            ..PlacementConfig::default()
        };
        let (mut scheduler, clock) = scheduler(&config);
        let handle = RefreshHandle::new();
        scheduler.start(&handle);

        for _ in 0..5 {
            clock.advance(Duration::from_secs(2));
            assert!(scheduler.tick(&handle));
        }
        assert_eq!(scheduler.iteration(), 0);
        assert_eq!(scheduler.interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_tick_requests_refresh() {
        let (mut scheduler, clock) = scheduler(&PlacementConfig::default());
        let handle = RefreshHandle::new();
        scheduler.start(&handle);
        assert!(matches!(handle.try_begin_pass(), PassEntry::Entered(_)));
        assert!(!handle.needs_refresh());

        clock.advance(Duration::from_secs(2));
        scheduler.tick(&handle);
        assert!(handle.needs_refresh());

        scheduler.stop();
        clock.advance(Duration::from_secs(60));
        assert!(!scheduler.tick(&handle));
        assert_eq!(scheduler.time_until_next(), None);
    }

    #[test]
    fn test_background_timer() {
        let config = PlacementConfig {
            base_refresh_interval_ms: 5,
            ..PlacementConfig::default()
        };
        let handle = RefreshHandle::new();
        let _ = handle.try_begin_pass();
        assert!(!handle.needs_refresh());

        let scheduler: SharedScheduler = Arc::new(Mutex::new(RefreshScheduler::new(&config, Arc::new(SystemClock))));
        let timer = spawn_refresh_timer(Arc::clone(&scheduler), handle.clone());
        let deadline = Instant::now() + Duration::from_secs(5);
        while lock_scheduler(&scheduler).iteration() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.needs_refresh());
        assert!(lock_scheduler(&scheduler).iteration() >= 1);

        timer.stop();
        let _ = handle.try_begin_pass();
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.needs_refresh());
        assert!(lock_scheduler(&scheduler).is_running());
    }
}
