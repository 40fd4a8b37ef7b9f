//! Debounce gate: turns bursts of notifications into single settlements.
//!
//! The gate is a small state machine guarded by a [`parking_lot::Mutex`]:
//!
//! ```text
//!           notify()                  quiet period elapsed
//!   Idle ───────────► Pending ──────────────────────────────► InFlight
//!    ▲                 │  ▲ notify() resets the timer            │
//!    │                 └──┘                                      │
//!    │        Settlement dropped, nothing pending                │
//!    ├───────────────────────────────────────────────────────────┤
//!    │        Settlement dropped, notified meanwhile             │
//!    │        (timer restarts from the completion)               ▼
//!    └───────────────────────────────────────────────────── Pending
//! ```
//!
//! [`DebounceGate::notify`] only touches the state and wakes the timer task;
//! it never blocks on the consumer. The timer task hands each settlement to
//! the consumer over a channel. A [`Settlement`] counts as in flight until it
//! is dropped, so at most one is outstanding and any notifications that
//! arrive meanwhile collapse into exactly one follow-up.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Proof that a burst of notifications has settled.
///
/// Dropping the settlement marks the work it triggered as complete.
#[derive(Debug)]
#[must_use = "dropping a settlement immediately marks its work as complete"]
pub struct Settlement {
    seq: u64,
    coalesced: u64,
    _guard: InFlightGuard,
}

impl Settlement {
    /// Sequence number, starting at 1.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Number of notifications folded into this settlement.
    #[must_use]
    pub const fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Marks the triggered work as complete.
    pub fn complete(self) {
        drop(self);
    }
}

#[derive(Debug)]
struct InFlightGuard {
    shared: Arc<Shared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.finish_in_flight();
    }
}

#[derive(Debug, Default)]
struct GateState {
    last_notify: Option<Instant>,
    pending: u64,
    in_flight: bool,
    next_seq: u64,
}

#[derive(Debug)]
struct Shared {
    quiet: Duration,
    state: Mutex<GateState>,
    wake: Notify,
}

impl Shared {
    fn finish_in_flight(&self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        if state.pending > 0 {
            // The follow-up's quiet period starts no earlier than now.
            state.last_notify = Some(Instant::now());
        }
        drop(state);
        self.wake.notify_one();
    }
}

enum Step {
    Wait,
    SleepUntil(Instant),
    Fire(u64, u64),
}

/// Coalesces notifications into settlements after a quiet period.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use tsgen_regen::DebounceGate;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (gate, mut settlements) = DebounceGate::spawn(Duration::from_millis(10), CancellationToken::new());
///
/// gate.notify();
/// gate.notify();
///
/// let settlement = settlements.recv().await.unwrap();
/// assert_eq!(settlement.coalesced(), 2);
/// settlement.complete();
///
/// gate.shutdown().await;
/// # }
/// ```
#[derive(Debug)]
pub struct DebounceGate {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceGate {
    /// Starts the gate's timer task.
    ///
    /// Returns the gate and the receiving end for settlements. The receiver
    /// yields `None` once the gate is shut down (or `cancel` fires).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(quiet: Duration, cancel: CancellationToken) -> (Self, mpsc::Receiver<Settlement>) {
        let shared = Arc::new(Shared {
            quiet,
            state: Mutex::new(GateState::default()),
            wake: Notify::new(),
        });
        // At most one settlement is outstanding, so one slot is enough.
        let (tx, rx) = mpsc::channel(1);

        let task = tokio::spawn(run_timer(Arc::clone(&shared), cancel.clone(), tx));

        let gate = Self {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        };
        (gate, rx)
    }

    /// Records a notification; restarts the quiet period.
    pub fn notify(&self) {
        let mut state = self.shared.state.lock();
        state.last_notify = Some(Instant::now());
        state.pending += 1;
        let pending = state.pending;
        drop(state);

        trace!(pending, "Debounce notified");
        self.shared.wake.notify_one();
    }

    /// Returns the quiet period.
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.shared.quiet
    }

    /// Returns `true` while notifications are waiting to settle.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().pending > 0
    }

    /// Returns `true` while a settlement is outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.shared.state.lock().in_flight
    }

    /// Stops the timer, discarding any unsettled notifications.
    ///
    /// A settlement already handed out stays valid.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for DebounceGate {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_timer(shared: Arc<Shared>, cancel: CancellationToken, tx: mpsc::Sender<Settlement>) {
    loop {
        let step = {
            let mut state = shared.state.lock();
            match state.last_notify {
                Some(last) if state.pending > 0 && !state.in_flight => {
                    let deadline = last + shared.quiet;
                    if Instant::now() >= deadline {
                        let coalesced = std::mem::take(&mut state.pending);
                        state.in_flight = true;
                        state.next_seq += 1;
                        Step::Fire(state.next_seq, coalesced)
                    } else {
                        Step::SleepUntil(deadline)
                    }
                }
                _ => Step::Wait,
            }
        };

        match step {
            Step::Wait => {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = shared.wake.notified() => {}
                }
            }
            Step::SleepUntil(deadline) => {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep_until(deadline) => {}
                    () = shared.wake.notified() => {}
                }
            }
            Step::Fire(seq, coalesced) => {
                debug!(seq, coalesced, "Debounce settled");
                let settlement = Settlement {
                    seq,
                    coalesced,
                    _guard: InFlightGuard {
                        shared: Arc::clone(&shared),
                    },
                };
                if tx.send(settlement).await.is_err() {
                    debug!("Settlement receiver dropped, stopping debounce timer");
                    break;
                }
            }
        }
    }

    let discarded = std::mem::take(&mut shared.state.lock().pending);
    if discarded > 0 {
        debug!(discarded, "Discarded unsettled notifications");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    const QUIET: Duration = Duration::from_millis(200);

    fn within(elapsed: Duration, expected: Duration) -> bool {
        elapsed >= expected && elapsed < expected + Duration::from_millis(5)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_settles_once_after_last_notify() {
        let (gate, mut rx) = DebounceGate::spawn(QUIET, CancellationToken::new());
        let start = Instant::now();

        gate.notify();
        sleep(Duration::from_millis(50)).await;
        gate.notify();
        sleep(Duration::from_millis(50)).await;
        gate.notify();

        let settlement = rx.recv().await.unwrap();
        let elapsed = start.elapsed();
        assert!(within(elapsed, Duration::from_millis(300)), "settled after {elapsed:?}");
        assert_eq!(settlement.seq(), 1);
        assert_eq!(settlement.coalesced(), 3);
        settlement.complete();

        sleep(Duration::from_secs(2)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_notify_settles_after_one_quiet_period() {
        let (gate, mut rx) = DebounceGate::spawn(QUIET, CancellationToken::new());
        let start = Instant::now();

        gate.notify();
        assert!(gate.is_pending());

        let settlement = rx.recv().await.unwrap();
        assert!(within(start.elapsed(), QUIET));
        assert!(gate.is_in_flight());
        assert!(!gate.is_pending());
        drop(settlement);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_quiet_period_settles_immediately() {
        let (gate, mut rx) = DebounceGate::spawn(Duration::ZERO, CancellationToken::new());
        let start = Instant::now();

        gate.notify();
        let settlement = rx.recv().await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(1));
        assert_eq!(settlement.coalesced(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_during_flight_collapse_into_one_follow_up() {
        let (gate, mut rx) = DebounceGate::spawn(QUIET, CancellationToken::new());

        gate.notify();
        let first = rx.recv().await.unwrap();

        for _ in 0..3 {
            sleep(Duration::from_millis(30)).await;
            gate.notify();
        }

        // Nothing is released while the first settlement is outstanding.
        sleep(Duration::from_secs(1)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        let completed_at = Instant::now();
        first.complete();

        let follow_up = rx.recv().await.unwrap();
        assert!(within(completed_at.elapsed(), QUIET));
        assert_eq!(follow_up.seq(), 2);
        assert_eq!(follow_up.coalesced(), 3);
        drop(follow_up);

        sleep(Duration::from_secs(1)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_waits_for_late_notification() {
        let (gate, mut rx) = DebounceGate::spawn(QUIET, CancellationToken::new());

        gate.notify();
        let first = rx.recv().await.unwrap();
        first.complete();

        // A notification after completion gets its own full quiet period.
        sleep(Duration::from_millis(10)).await;
        let notified_at = Instant::now();
        gate.notify();

        let second = rx.recv().await.unwrap();
        assert!(within(notified_at.elapsed(), QUIET));
        assert_eq!(second.coalesced(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_timer() {
        let (gate, mut rx) = DebounceGate::spawn(QUIET, CancellationToken::new());

        gate.notify();
        sleep(Duration::from_millis(100)).await;
        gate.shutdown().await;

        assert!(rx.recv().await.is_none());
        assert!(!gate.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settlement_outlives_shutdown() {
        let cancel = CancellationToken::new();
        let (gate, mut rx) = DebounceGate::spawn(QUIET, cancel.clone());

        gate.notify();
        let settlement = rx.recv().await.unwrap();
        cancel.cancel();
        gate.shutdown().await;

        assert_eq!(settlement.seq(), 1);
        settlement.complete();
        assert!(!gate.is_in_flight());
        assert!(rx.recv().await.is_none());
    }
}
