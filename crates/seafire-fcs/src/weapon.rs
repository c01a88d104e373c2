//! Per-weapon control state machine.
//!
//! Each weapon drives its own state through the operator-controlled
//! transition graph. Long-running transitions (power-on check, launch
//! sequence) block the calling thread and poll their cancellation handle
//! every 50 ms; an abort request cancels the in-flight transition before
//! taking the transition lock, so it can never deadlock against it.
//!
//! Observer notifications are enqueued in transition order under the
//! transition lock and delivered FIFO after it is released, so the
//! observed sequence always matches the internal one even when an abort
//! races the transition it cancelled. Calling back into
//! `request_state_change` from an observer is not supported.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use seafire_core::cancel::CancelToken;
use seafire_core::constants::CANCEL_POLL_INTERVAL_MS;
use seafire_core::enums::{ControlState, WeaponKind};
use seafire_core::events::WeaponObserver;
use seafire_core::types::{LaunchStep, WeaponSpec};
use seafire_core::{Result, WcsError};

/// Event enqueued during a transition, delivered after the lock drops.
#[derive(Debug, Clone, Copy)]
enum Notification {
    StateChanged(ControlState, ControlState),
    LaunchStatusChanged(bool),
}

/// A weapon bound to one launch tube.
///
/// The state field is atomic; the transition mutex serializes transition
/// execution so at most one transition runs at a time.
pub struct Weapon {
    kind: WeaponKind,
    spec: WeaponSpec,
    power_on_delay_secs: f64,
    launch_steps: Vec<LaunchStep>,

    tube_number: AtomicU16,
    state: AtomicU8,
    launched: AtomicBool,
    fire_solution_ready: AtomicBool,

    transition: Mutex<()>,
    current_cancel: Mutex<CancelToken>,
    observers: Mutex<Vec<Weak<dyn WeaponObserver>>>,
    pending: Mutex<VecDeque<Notification>>,
    dispatching: Mutex<()>,
}

impl Weapon {
    pub fn new(
        kind: WeaponKind,
        spec: WeaponSpec,
        power_on_delay_secs: f64,
        launch_steps: Vec<LaunchStep>,
    ) -> Self {
        Self {
            kind,
            spec,
            power_on_delay_secs,
            launch_steps,
            tube_number: AtomicU16::new(0),
            state: AtomicU8::new(encode(ControlState::Off)),
            launched: AtomicBool::new(false),
            fire_solution_ready: AtomicBool::new(false),
            transition: Mutex::new(()),
            current_cancel: Mutex::new(CancelToken::new()),
            observers: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            dispatching: Mutex::new(()),
        }
    }

    // --- Basic information ---

    pub fn kind(&self) -> WeaponKind {
        self.kind
    }

    pub fn specification(&self) -> &WeaponSpec {
        &self.spec
    }

    pub fn tube_number(&self) -> u16 {
        self.tube_number.load(Ordering::SeqCst)
    }

    pub fn current_state(&self) -> ControlState {
        decode(self.state.load(Ordering::SeqCst))
    }

    pub fn is_launched(&self) -> bool {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn fire_solution_ready(&self) -> bool {
        self.fire_solution_ready.load(Ordering::SeqCst)
    }

    pub fn set_fire_solution_ready(&self, ready: bool) {
        self.fire_solution_ready.store(ready, Ordering::SeqCst);
    }

    /// Launch interlock check: the fire solution gate, tightened per kind.
    ///
    /// Kind-specific conditions join this conjunction; every current kind
    /// gates on the fire solution alone.
    pub fn check_interlocks(&self) -> bool {
        self.fire_solution_ready()
    }

    // --- Lifecycle ---

    /// Bind the weapon to its tube and reset to the initial state.
    pub fn initialize(&self, tube_number: u16) -> Result<()> {
        self.tube_number.store(tube_number, Ordering::SeqCst);
        self.reset();
        info!(
            kind = self.kind.label(),
            tube_number, "weapon initialized"
        );
        Ok(())
    }

    /// Silent return to the initial state: cancels any in-flight
    /// transition, no observer notifications.
    pub fn reset(&self) {
        if let Ok(current) = self.current_cancel.lock() {
            current.cancel();
        }
        let _guard = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.state.store(encode(ControlState::Off), Ordering::SeqCst);
        self.launched.store(false, Ordering::SeqCst);
        self.fire_solution_ready.store(false, Ordering::SeqCst);
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }

    // --- Observers ---

    /// Register a non-owning observer. Expired entries are swept before
    /// every dispatch.
    pub fn add_observer(&self, observer: Weak<dyn WeaponObserver>) {
        if let Ok(mut list) = self.observers.lock() {
            list.push(observer);
        }
    }

    /// Remove an observer by identity (and sweep expired entries).
    pub fn remove_observer(&self, observer: &Weak<dyn WeaponObserver>) {
        let target = observer.as_ptr() as *const ();
        if let Ok(mut list) = self.observers.lock() {
            list.retain(|w| w.strong_count() > 0 && (w.as_ptr() as *const ()) != target);
        }
    }

    // --- State control ---

    /// Drive the weapon toward `new_state`.
    ///
    /// Abort requests always succeed: they cancel the in-flight transition
    /// (if any) and flip the state to `Abort` from anywhere. Other targets
    /// are validated against the transition graph and may block for the
    /// duration of the transition's work; the supplied token cancels it.
    pub fn request_state_change(&self, new_state: ControlState, token: CancelToken) -> Result<()> {
        let result = self.execute_transition(new_state, token);
        self.drain_notifications();
        match &result {
            Ok(()) => info!(
                kind = self.kind.label(),
                tube = self.tube_number(),
                state = self.current_state().label(),
                "state change complete"
            ),
            Err(e) => debug!(
                kind = self.kind.label(),
                tube = self.tube_number(),
                target = new_state.label(),
                error = %e,
                "state change rejected"
            ),
        }
        result
    }

    /// Automatic edges, evaluated once per tick: promote `On` to `Rtl`
    /// when interlocks hold, demote `Rtl` to `On` when they no longer do.
    /// Skipped while a transition is in flight.
    pub fn update(&self) {
        {
            let Ok(_guard) = self.transition.try_lock() else {
                return;
            };
            match self.current_state() {
                ControlState::On if self.check_interlocks() => {
                    self.push_state(ControlState::Rtl);
                }
                ControlState::Rtl if !self.check_interlocks() => {
                    self.push_state(ControlState::On);
                }
                _ => {}
            }
        }
        self.drain_notifications();
    }

    fn execute_transition(&self, new_state: ControlState, token: CancelToken) -> Result<()> {
        if new_state == ControlState::Abort {
            // Unblock the in-flight transition before taking its lock.
            if let Ok(current) = self.current_cancel.lock() {
                current.cancel();
            }
            let _guard = self
                .transition
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.push_state(ControlState::Abort);
            if self.launched.swap(false, Ordering::SeqCst) {
                self.enqueue(Notification::LaunchStatusChanged(false));
            }
            return Ok(());
        }

        let _guard = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.current_state();
        if !current.can_transition_to(new_state) {
            return Err(WcsError::InvalidTransition {
                from: current,
                to: new_state,
            });
        }

        // The caller's token becomes the weapon's current handle for the
        // duration of this transition; abort cancels it.
        if let Ok(mut handle) = self.current_cancel.lock() {
            *handle = token.clone();
        }

        match new_state {
            ControlState::On => self.process_turn_on(&token),
            ControlState::Launch => self.process_launch(&token),
            ControlState::Off => {
                self.process_turn_off();
                Ok(())
            }
            other => {
                self.push_state(other);
                Ok(())
            }
        }
    }

    fn process_turn_on(&self, token: &CancelToken) -> Result<()> {
        self.push_state(ControlState::Poc);
        debug!(
            kind = self.kind.label(),
            tube = self.tube_number(),
            delay_secs = self.power_on_delay_secs,
            "power-on check started"
        );

        if !self.sleep_with_cancel(self.power_on_delay_secs, token) {
            self.push_state(ControlState::Off);
            return Err(WcsError::Cancelled);
        }

        self.push_state(ControlState::On);
        Ok(())
    }

    fn process_launch(&self, token: &CancelToken) -> Result<()> {
        self.push_state(ControlState::Launch);

        for step in &self.launch_steps {
            debug!(
                kind = self.kind.label(),
                tube = self.tube_number(),
                step = %step.description,
                duration_secs = step.duration_secs,
                "launch step"
            );
            if !self.sleep_with_cancel(step.duration_secs, token) {
                self.push_state(ControlState::Abort);
                return Err(WcsError::Cancelled);
            }
        }

        // Launch completion: launched flag and POST_LAUNCH are set back to
        // back under the transition lock, with both notifications emitted.
        self.push_state(ControlState::PostLaunch);
        if !self.launched.swap(true, Ordering::SeqCst) {
            self.enqueue(Notification::LaunchStatusChanged(true));
        }
        info!(
            kind = self.kind.label(),
            tube = self.tube_number(),
            "launch complete"
        );
        Ok(())
    }

    fn process_turn_off(&self) {
        if let Ok(current) = self.current_cancel.lock() {
            current.cancel();
        }
        self.push_state(ControlState::Off);
        if self.launched.swap(false, Ordering::SeqCst) {
            self.enqueue(Notification::LaunchStatusChanged(false));
        }
    }

    /// Sleep for `duration_secs` in 50 ms slices, checking both the
    /// supplied token and the weapon's current handle. Returns `false` as
    /// soon as cancellation is observed.
    fn sleep_with_cancel(&self, duration_secs: f64, token: &CancelToken) -> bool {
        let slice = Duration::from_millis(CANCEL_POLL_INTERVAL_MS);
        let deadline = Instant::now() + Duration::from_secs_f64(duration_secs.max(0.0));

        loop {
            if token.is_cancelled() || self.current_handle_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(slice));
        }
    }

    fn current_handle_cancelled(&self) -> bool {
        self.current_cancel
            .lock()
            .map(|handle| handle.is_cancelled())
            .unwrap_or(false)
    }

    fn push_state(&self, new_state: ControlState) {
        let old = decode(self.state.swap(encode(new_state), Ordering::SeqCst));
        if old != new_state {
            self.enqueue(Notification::StateChanged(old, new_state));
        }
    }

    fn enqueue(&self, event: Notification) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(event);
        }
    }

    /// Deliver queued notifications FIFO. The dispatch lock serializes
    /// delivery across threads; expired observers are swept per event and
    /// no transition or observer-list lock is held during observer code.
    fn drain_notifications(&self) {
        let _guard = self
            .dispatching
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            let event = match self.pending.lock() {
                Ok(mut pending) => pending.pop_front(),
                Err(_) => None,
            };
            let Some(event) = event else {
                break;
            };

            let observers: Vec<_> = match self.observers.lock() {
                Ok(mut list) => {
                    list.retain(|w| w.strong_count() > 0);
                    list.iter().filter_map(Weak::upgrade).collect()
                }
                Err(_) => continue,
            };

            let tube_number = self.tube_number();
            for observer in &observers {
                match event {
                    Notification::StateChanged(old, new) => {
                        observer.on_state_changed(tube_number, old, new)
                    }
                    Notification::LaunchStatusChanged(launched) => {
                        observer.on_launch_status_changed(tube_number, launched)
                    }
                }
            }
        }
    }
}

fn encode(state: ControlState) -> u8 {
    match state {
        ControlState::Off => 0,
        ControlState::Poc => 1,
        ControlState::On => 2,
        ControlState::Rtl => 3,
        ControlState::Launch => 4,
        ControlState::PostLaunch => 5,
        ControlState::Abort => 6,
    }
}

fn decode(value: u8) -> ControlState {
    match value {
        0 => ControlState::Off,
        1 => ControlState::Poc,
        2 => ControlState::On,
        3 => ControlState::Rtl,
        4 => ControlState::Launch,
        5 => ControlState::PostLaunch,
        _ => ControlState::Abort,
    }
}
