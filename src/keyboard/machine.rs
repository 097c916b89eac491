//! Per-key press/release state machine
//!
//! Every key cycles `Idle -> Pressed -> Idle`. A trigger on an idle key
//! reports a press and schedules a release for one hold duration later; the
//! release callback runs on the timer worker. Triggers on a pressed key are
//! ignored and never extend the hold.
//!
//! Each key's state and pending timer live behind that key's own lock. Press
//! and release notifications are sent while holding it, which is what keeps
//! the per-key event order `press, release, press, ...` under concurrency.

use super::{KeyCode, KeyRegistry, KeyState};
use crate::sink::EventSink;
use crate::timer::TimerScheduler;
use log::{debug, info, trace, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long a virtual press is held before the automatic release
pub const HOLD_DURATION: Duration = Duration::from_millis(1000);

/// Error type for state machine operations
#[derive(Debug, Error)]
pub enum KeyError {
    /// Teardown has run; no more triggers are accepted
    #[error("key emulator has been torn down")]
    Closed,
    /// The timer worker could not be started
    #[error("failed to start timer worker: {0}")]
    Spawn(#[from] io::Error),
}

/// Which branch a successful trigger took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Key went from idle to pressed; a release is scheduled
    Pressed,
    /// Key was already down; nothing changed
    AlreadyPressed,
    /// Code is not in the registry; nothing changed
    Unknown,
}

/// Drives press/release cycles for every key in a registry
pub struct KeyStateMachine {
    registry: Arc<KeyRegistry>,
    sink: Arc<dyn EventSink>,
    scheduler: TimerScheduler,
    hold: Duration,
    accepting: AtomicBool,
}

impl KeyStateMachine {
    /// Create a machine using the standard [`HOLD_DURATION`]
    pub fn new(registry: KeyRegistry, sink: Arc<dyn EventSink>) -> Result<Self, KeyError> {
        Self::with_hold(registry, sink, HOLD_DURATION)
    }

    /// Create a machine with a different hold duration, shared by all keys
    pub fn with_hold(
        registry: KeyRegistry,
        sink: Arc<dyn EventSink>,
        hold: Duration,
    ) -> Result<Self, KeyError> {
        let scheduler = TimerScheduler::new()?;
        info!(
            "key emulator ready: {} key(s), hold {} ms",
            registry.len(),
            hold.as_millis()
        );
        Ok(Self {
            registry: Arc::new(registry),
            sink,
            scheduler,
            hold,
            accepting: AtomicBool::new(true),
        })
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold
    }

    /// All known codes in registration order
    pub fn list_codes(&self) -> Vec<KeyCode> {
        self.registry.list_codes()
    }

    /// Current state of a known key
    pub fn state(&self, code: KeyCode) -> Option<KeyState> {
        self.registry.get(code).map(|key| key.state())
    }

    /// Number of release timers waiting to fire
    pub fn pending_releases(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Request a virtual press of `code`.
    ///
    /// Unknown codes and keys that are already down are accepted and ignored.
    /// Fails only after [`teardown`](Self::teardown).
    pub fn trigger(&self, code: KeyCode) -> Result<TriggerOutcome, KeyError> {
        if !self.is_accepting() {
            warn!("trigger for key {} after teardown", code);
            return Err(KeyError::Closed);
        }

        let Some(position) = self.registry.position(code) else {
            debug!("ignoring trigger for unknown key {}", code);
            return Ok(TriggerOutcome::Unknown);
        };
        let Some(key) = self.registry.descriptor(position) else {
            return Ok(TriggerOutcome::Unknown);
        };

        let mut slot = key.lock();

        // Teardown flips the flag before it visits any key lock, so checking
        // again here closes the window between the first check and the lock.
        if !self.is_accepting() {
            warn!("trigger for key {} after teardown", code);
            return Err(KeyError::Closed);
        }

        if slot.state == KeyState::Pressed {
            trace!("key {} already pressed", code);
            return Ok(TriggerOutcome::AlreadyPressed);
        }

        slot.state = KeyState::Pressed;
        debug!("press key {}", code);
        if let Err(err) = self.sink.press(code) {
            warn!("failed to report press of key {}: {}", code, err);
        }

        let registry = Arc::clone(&self.registry);
        let sink = Arc::clone(&self.sink);
        let handle = self.scheduler.schedule(self.hold, move || {
            on_timeout(&registry, sink.as_ref(), position);
        });
        slot.pending = Some(handle);

        Ok(TriggerOutcome::Pressed)
    }

    /// Stop accepting triggers and cancel every pending release.
    ///
    /// Releases cancelled before their callback started are never reported;
    /// their keys return to idle silently. A callback that is already running
    /// is waited for and reports its release normally. Safe to call more
    /// than once.
    pub fn teardown(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            info!("tearing down key emulator");
        }

        let mut cancelled = 0;
        for key in self.registry.iter() {
            // The lock is released before waiting: a running callback needs it.
            let Some(handle) = key.lock().pending.take() else {
                continue;
            };

            if self.scheduler.cancel_sync(&handle) {
                key.lock().state = KeyState::Idle;
                debug!("cancelled pending release of key {}", key.code());
                cancelled += 1;
            }
        }

        if cancelled > 0 {
            info!("cancelled {} pending release(s)", cancelled);
        }
    }
}

impl Drop for KeyStateMachine {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Timer callback: release the key at `position` if it is still down
fn on_timeout(registry: &KeyRegistry, sink: &dyn EventSink, position: usize) {
    let Some(key) = registry.descriptor(position) else {
        return;
    };

    let mut slot = key.lock();
    if slot.state != KeyState::Pressed {
        trace!("release timer for idle key {} ignored", key.code());
        return;
    }

    slot.state = KeyState::Idle;
    slot.pending = None;
    debug!("release key {}", key.code());
    if let Err(err) = sink.release(key.code()) {
        warn!("failed to report release of key {}: {}", key.code(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{KeyEvent, KeyEventType};
    use crate::sink::{ChannelSink, SinkError};
    use parking_lot::Mutex;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Instant;

    const SHORT_HOLD: Duration = Duration::from_millis(60);
    const WAIT: Duration = Duration::from_secs(2);

    fn machine(codes: &[u32], hold: Duration) -> (KeyStateMachine, mpsc::Receiver<KeyEvent>) {
        let registry = KeyRegistry::load(codes.iter().copied()).unwrap();
        let (sink, rx) = ChannelSink::channel();
        let machine = KeyStateMachine::with_hold(registry, Arc::new(sink), hold).unwrap();
        (machine, rx)
    }

    #[test]
    fn unknown_code_is_ignored() {
        let (machine, rx) = machine(&[7, 9], SHORT_HOLD);

        assert_eq!(
            machine.trigger(KeyCode(8)).unwrap(),
            TriggerOutcome::Unknown
        );
        assert_eq!(machine.state(KeyCode(7)), Some(KeyState::Idle));
        assert_eq!(machine.state(KeyCode(9)), Some(KeyState::Idle));
        assert_eq!(machine.state(KeyCode(8)), None);
        assert_eq!(machine.pending_releases(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn idle_key_presses_and_schedules_one_release() {
        let (machine, rx) = machine(&[7], Duration::from_secs(5));

        assert_eq!(
            machine.trigger(KeyCode(7)).unwrap(),
            TriggerOutcome::Pressed
        );
        assert_eq!(machine.state(KeyCode(7)), Some(KeyState::Pressed));
        assert_eq!(machine.pending_releases(), 1);

        let press = rx.try_recv().unwrap();
        assert_eq!(press.code, KeyCode(7));
        assert_eq!(press.event_type, KeyEventType::Press);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn release_follows_after_hold() {
        let (machine, rx) = machine(&[30], SHORT_HOLD);

        machine.trigger(KeyCode(30)).unwrap();
        let press = rx.recv_timeout(WAIT).unwrap();
        let release = rx.recv_timeout(WAIT).unwrap();

        assert_eq!(release.event_type, KeyEventType::Release);
        assert_eq!(release.code, KeyCode(30));
        assert!(release.timestamp.duration_since(press.timestamp) >= SHORT_HOLD);
        assert_eq!(machine.state(KeyCode(30)), Some(KeyState::Idle));
        assert!(!machine.registry().get(KeyCode(30)).unwrap().has_pending_release());
    }

    #[test]
    fn duplicate_trigger_does_not_extend_hold() {
        let (machine, rx) = machine(&[30], Duration::from_millis(150));

        let start = Instant::now();
        machine.trigger(KeyCode(30)).unwrap();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(
            machine.trigger(KeyCode(30)).unwrap(),
            TriggerOutcome::AlreadyPressed
        );
        assert_eq!(machine.pending_releases(), 1);

        assert_eq!(rx.recv_timeout(WAIT).unwrap().event_type, KeyEventType::Press);
        let release = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(release.event_type, KeyEventType::Release);
        // Released relative to the first trigger, not the second.
        assert!(release.timestamp.duration_since(start) < Duration::from_millis(150 + 80));
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(100)),
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[test]
    fn key_can_be_pressed_again_after_release() {
        let (machine, rx) = machine(&[30], SHORT_HOLD);

        for _ in 0..2 {
            assert_eq!(
                machine.trigger(KeyCode(30)).unwrap(),
                TriggerOutcome::Pressed
            );
            assert_eq!(rx.recv_timeout(WAIT).unwrap().event_type, KeyEventType::Press);
            assert_eq!(
                rx.recv_timeout(WAIT).unwrap().event_type,
                KeyEventType::Release
            );
        }
    }

    #[test]
    fn concurrent_triggers_press_once() {
        let (machine, rx) = machine(&[30], Duration::from_millis(300));
        let machine = Arc::new(machine);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let machine = Arc::clone(&machine);
                thread::spawn(move || {
                    for _ in 0..50 {
                        machine.trigger(KeyCode(30)).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, KeyEventType::Press);
    }

    #[test]
    fn distinct_keys_are_independent() {
        let (machine, rx) = machine(&[7, 9], SHORT_HOLD);

        machine.trigger(KeyCode(7)).unwrap();
        thread::sleep(Duration::from_millis(20));
        machine.trigger(KeyCode(9)).unwrap();

        let events: Vec<_> = (0..4).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        let for_key = |code: u32| -> Vec<KeyEventType> {
            events
                .iter()
                .filter(|e| e.code == KeyCode(code))
                .map(|e| e.event_type)
                .collect()
        };
        assert_eq!(for_key(7), vec![KeyEventType::Press, KeyEventType::Release]);
        assert_eq!(for_key(9), vec![KeyEventType::Press, KeyEventType::Release]);
    }

    #[test]
    fn teardown_cancels_pending_release() {
        let (machine, rx) = machine(&[7], SHORT_HOLD);

        machine.trigger(KeyCode(7)).unwrap();
        machine.teardown();

        assert_eq!(rx.try_recv().unwrap().event_type, KeyEventType::Press);
        assert_eq!(
            rx.recv_timeout(SHORT_HOLD * 3),
            Err(RecvTimeoutError::Timeout)
        );
        assert_eq!(machine.state(KeyCode(7)), Some(KeyState::Idle));
        assert_eq!(machine.pending_releases(), 0);
    }

    #[test]
    fn trigger_after_teardown_is_rejected() {
        let (machine, rx) = machine(&[7], SHORT_HOLD);

        machine.teardown();
        assert!(!machine.is_accepting());
        assert!(matches!(machine.trigger(KeyCode(7)), Err(KeyError::Closed)));
        assert!(matches!(machine.trigger(KeyCode(8)), Err(KeyError::Closed)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn teardown_is_repeatable() {
        let (machine, _rx) = machine(&[7], SHORT_HOLD);
        machine.trigger(KeyCode(7)).unwrap();
        machine.teardown();
        machine.teardown();
        assert_eq!(machine.state(KeyCode(7)), Some(KeyState::Idle));
    }

    /// Forwards presses, but parks inside `release` until the gate opens
    struct GatedSink {
        inner: ChannelSink,
        entered: Mutex<mpsc::Sender<()>>,
        gate: Barrier,
    }

    impl EventSink for GatedSink {
        fn press(&self, code: KeyCode) -> Result<(), SinkError> {
            self.inner.press(code)
        }

        fn release(&self, code: KeyCode) -> Result<(), SinkError> {
            let _ = self.entered.lock().send(());
            self.gate.wait();
            self.inner.release(code)
        }
    }

    /// Reports the press, then fails inside the release of one key
    struct PanickingSink {
        inner: ChannelSink,
        poisoned: KeyCode,
    }

    impl EventSink for PanickingSink {
        fn press(&self, code: KeyCode) -> Result<(), SinkError> {
            self.inner.press(code)
        }

        fn release(&self, code: KeyCode) -> Result<(), SinkError> {
            if code == self.poisoned {
                panic!("release of key {} failed", code);
            }
            self.inner.release(code)
        }
    }

    #[test]
    fn teardown_waits_for_running_release() {
        let (inner, rx) = ChannelSink::channel();
        let (entered_tx, entered_rx) = mpsc::channel();
        let sink = Arc::new(GatedSink {
            inner,
            entered: Mutex::new(entered_tx),
            gate: Barrier::new(2),
        });
        let registry = KeyRegistry::load([7u32]).unwrap();
        let machine = Arc::new(
            KeyStateMachine::with_hold(registry, sink.clone(), Duration::from_millis(10)).unwrap(),
        );

        machine.trigger(KeyCode(7)).unwrap();
        entered_rx.recv_timeout(WAIT).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let tearing = Arc::clone(&machine);
        let teardown = thread::spawn(move || {
            tearing.teardown();
            done_tx.send(()).unwrap();
        });

        // The release callback is parked in the sink, so teardown must wait.
        assert_eq!(
            done_rx.recv_timeout(Duration::from_millis(100)),
            Err(RecvTimeoutError::Timeout)
        );

        sink.gate.wait();
        done_rx.recv_timeout(WAIT).unwrap();
        teardown.join().unwrap();

        let events: Vec<_> = rx.try_iter().map(|e| e.event_type).collect();
        assert_eq!(events, vec![KeyEventType::Press, KeyEventType::Release]);
        assert_eq!(machine.state(KeyCode(7)), Some(KeyState::Idle));
        assert!(!machine.is_accepting());
    }

    #[test]
    fn panicking_release_does_not_stall_other_keys() {
        let (inner, rx) = ChannelSink::channel();
        let sink = Arc::new(PanickingSink {
            inner,
            poisoned: KeyCode(7),
        });
        let registry = KeyRegistry::load([7u32, 9]).unwrap();
        let machine =
            KeyStateMachine::with_hold(registry, sink, Duration::from_millis(20)).unwrap();

        machine.trigger(KeyCode(7)).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().code, KeyCode(7));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(machine.state(KeyCode(7)), Some(KeyState::Idle));

        machine.trigger(KeyCode(9)).unwrap();
        let press = rx.recv_timeout(WAIT).unwrap();
        let release = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(
            (press.code, press.event_type),
            (KeyCode(9), KeyEventType::Press)
        );
        assert_eq!(
            (release.code, release.event_type),
            (KeyCode(9), KeyEventType::Release)
        );
        assert_eq!(machine.state(KeyCode(9)), Some(KeyState::Idle));
    }

    #[test]
    fn drop_tears_down() {
        let (machine, rx) = machine(&[7], SHORT_HOLD);
        machine.trigger(KeyCode(7)).unwrap();
        drop(machine);

        assert_eq!(rx.try_recv().unwrap().event_type, KeyEventType::Press);
        assert!(rx.recv_timeout(SHORT_HOLD * 2).is_err());
    }
}
