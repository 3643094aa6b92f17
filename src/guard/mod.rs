//! The rate-limit guard.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → admit() ── should_block? ──yes──▶ GuardError::Blocked
//!          │no
//!          ▼
//!     window records attempt → registry registers token → Permit
//!
//! Response:
//!     → on_response(permit, status, retry_after)
//!         2xx/3xx → failure counter decays
//!         429     → failure counter grows, may open circuit
//!
//! Entering Paused/Open:
//!     → cancel every in-flight token
//!     → arm deadline timer (if a tokio runtime is present)
//!     → notify listeners
//! ```
//!
//! # Design Decisions
//! - One mutex per guard covers window, controller, registry and timers
//! - Admission is check-then-increment under that single lock
//! - Deadlines are enforced lazily on every access; timers only make the
//!   resume/close notification arrive without waiting for the next call
//! - Listeners run after the lock is released

mod state;
mod timers;
mod types;

pub use state::{format_remaining, Alert, GuardSnapshot};
pub(crate) use state::millis_u64;
pub use types::{BlockReason, GuardError, GuardResult};

use reqwest::StatusCode;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{validate_config, ConfigError, GuardConfig};
use crate::inflight::{CancellationRegistry, Permit, RequestId};
use crate::limits::WindowTracker;
use crate::observability::{metrics, ListenerSet, Subscription};
use crate::resilience::{PauseController, Transition};
use timers::TimerSlot;

/// Client-side request governance for one API client.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct Guard {
    shared: Arc<Shared>,
}

struct Shared {
    config: GuardConfig,
    core: Mutex<Core>,
    listeners: ListenerSet,
}

struct Core {
    window: WindowTracker,
    controller: PauseController,
    inflight: CancellationRegistry,
    resume_timer: TimerSlot,
    close_timer: TimerSlot,
}

impl Core {
    fn snapshot(&self, now: Instant) -> GuardSnapshot {
        let thresholds = self.controller.thresholds();
        let window = self.window.state(now);
        GuardSnapshot {
            is_open: self.controller.is_open(),
            is_paused: self.controller.is_paused(),
            level: thresholds.evaluate(window.count),
            request_count: window.count,
            max_requests: thresholds.max_requests,
            warning_threshold: thresholds.warning,
            block_threshold: thresholds.block,
            percentage_used: window.percentage_used,
            time_remaining: window.remaining,
            cooldown_remaining: self.controller.circuit().cooldown_remaining(now),
            failure_count: self.controller.circuit().failure_count(),
            in_flight: self.inflight.len(),
        }
    }

    fn block_reason(&self) -> BlockReason {
        if self.controller.is_open() {
            BlockReason::CircuitOpen
        } else if self.controller.is_paused() {
            BlockReason::Paused
        } else {
            BlockReason::WindowExhausted
        }
    }
}

/// What a locked operation changed, reported once the lock is released.
struct Outcome {
    transitions: Vec<Transition>,
    cancelled: usize,
    snapshot: Option<GuardSnapshot>,
}

impl Guard {
    /// Build a guard from a validated configuration.
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let now = Instant::now();
        let core = Core {
            window: WindowTracker::new(&config.window, now),
            controller: PauseController::new(&config),
            inflight: CancellationRegistry::new(),
            resume_timer: TimerSlot::default(),
            close_timer: TimerSlot::default(),
        };

        tracing::debug!(
            max_requests = config.window.max_requests,
            warning_threshold = config.window.warning_threshold,
            block_threshold = config.window.block_threshold,
            window_ms = config.window.duration_ms,
            "Rate-limit guard created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                core: Mutex::new(core),
                listeners: ListenerSet::new(),
            }),
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.shared.config
    }

    /// May a new request proceed right now?
    pub fn should_block(&self) -> bool {
        self.with_core(|core, now, out| {
            let blocked = core.controller.should_block(now, &mut core.window, out);
            (blocked, false)
        })
    }

    /// Count one request against the window.
    ///
    /// Returns false without counting once the block threshold is reached,
    /// and pauses the guard in that case.
    pub fn record_request(&self) -> bool {
        self.with_core(|core, now, out| {
            core.controller.sync(now, &mut core.window, out);
            if core.window.record_attempt(now) {
                (true, true)
            } else {
                core.controller.pause_preventively(now, &core.window, out);
                (false, false)
            }
        })
    }

    /// A request completed successfully; decays the failure counter.
    pub fn record_success(&self) {
        self.with_core(|core, _now, _out| {
            let before = core.controller.circuit().failure_count();
            core.controller.record_success();
            ((), before != core.controller.circuit().failure_count())
        })
    }

    /// The server reported overload (HTTP 429).
    pub fn record_overload_error(&self) {
        metrics::record_overload();
        self.with_core(|core, now, out| {
            core.controller.record_overload(now, out);
            ((), true)
        })
    }

    /// Open the circuit. No-op while already open.
    pub fn open(&self) {
        self.with_core(|core, now, out| {
            core.controller.open(now, out);
            ((), false)
        })
    }

    /// Pause until the current window resets. No-op while paused or open.
    pub fn pause_preventively(&self) {
        self.with_core(|core, now, out| {
            core.controller.sync(now, &mut core.window, out);
            core.controller.pause_preventively(now, &core.window, out);
            ((), false)
        })
    }

    /// Abort every in-flight request. Returns how many were registered.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.with_core(|core, _now, _out| {
            let cancelled = core.inflight.cancel_all();
            (cancelled, cancelled > 0)
        });
        if cancelled > 0 {
            tracing::warn!(count = cancelled, "Cancelled in-flight requests");
            metrics::record_cancelled(cancelled);
        }
        cancelled
    }

    /// Current state. Applies any deadline that has passed.
    pub fn state(&self) -> GuardSnapshot {
        self.with_core(|core, now, out| {
            core.controller.sync(now, &mut core.window, out);
            (core.snapshot(now), false)
        })
    }

    /// How long a refused caller should wait before asking again.
    pub fn recommended_delay(&self) -> Duration {
        self.with_core(|core, now, out| {
            core.controller.sync(now, &mut core.window, out);
            (core.controller.recommended_delay(now, &core.window), false)
        })
    }

    /// Register a callback for state changes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&GuardSnapshot) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(callback)
    }

    /// Request hook: decide admission and register the request as in flight.
    pub fn admit(&self) -> GuardResult<Permit> {
        let decision = self.with_core(|core, now, out| {
            if core.controller.should_block(now, &mut core.window, out) {
                let err = GuardError::Blocked {
                    reason: core.block_reason(),
                    retry_after: core.controller.recommended_delay(now, &core.window),
                };
                return (Err(err), false);
            }
            if !core.window.record_attempt(now) {
                core.controller.pause_preventively(now, &core.window, out);
                let err = GuardError::Blocked {
                    reason: BlockReason::WindowExhausted,
                    retry_after: core.window.remaining(now),
                };
                return (Err(err), false);
            }

            let id = RequestId::new();
            let token = CancellationToken::new();
            core.inflight.register(id, token.clone());
            (Ok((id, token)), true)
        });

        match decision {
            Ok((id, token)) => {
                metrics::record_admission("admitted");
                tracing::trace!(request_id = %id, "Request admitted");
                Ok(Permit::new(id, token, self.clone()))
            }
            Err(err) => {
                metrics::record_admission("blocked");
                tracing::debug!(error = %err, "Request refused");
                Err(err)
            }
        }
    }

    /// Response hook: release the permit and feed the status back.
    ///
    /// Success and redirect statuses decay the failure counter; 429 counts as
    /// overload and is returned as [`GuardError::ServerOverload`]. Other
    /// statuses are the caller's business.
    pub fn on_response(
        &self,
        permit: Permit,
        status: StatusCode,
        retry_after: Option<Duration>,
    ) -> GuardResult<()> {
        drop(permit);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let backoff = retry_after.unwrap_or_else(|| {
                Duration::from_millis(self.shared.config.client.default_overload_backoff_ms)
            });
            tracing::warn!(
                retry_after_ms = retry_after.map(millis_u64),
                "Server reported too many requests"
            );
            self.record_overload_error();
            return Err(GuardError::ServerOverload { retry_after, backoff });
        }

        if status.is_success() || status.is_redirection() {
            self.record_success();
        }
        Ok(())
    }

    pub(crate) fn release(&self, id: RequestId) {
        self.lock().inflight.unregister(id);
    }

    /// Timer callback: apply whatever deadline is due.
    fn tick(&self) {
        self.with_core(|core, now, out| {
            core.controller.sync(now, &mut core.window, out);
            ((), false)
        })
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.shared.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock, apply the side effects of any transitions it
    /// produced, then log and notify outside the lock.
    ///
    /// `f` returns its result and whether it changed observable state on its own.
    fn with_core<R>(
        &self,
        f: impl FnOnce(&mut Core, Instant, &mut Vec<Transition>) -> (R, bool),
    ) -> R {
        let now = Instant::now();
        let mut transitions = Vec::new();

        let (result, outcome) = {
            let mut guard = self.lock();
            let core = &mut *guard;
            let (result, changed) = f(core, now, &mut transitions);
            let cancelled = self.apply(core, &transitions);
            let snapshot = (changed || !transitions.is_empty()).then(|| core.snapshot(now));
            (
                result,
                Outcome {
                    transitions,
                    cancelled,
                    snapshot,
                },
            )
        };

        self.report(outcome);
        result
    }

    fn apply(&self, core: &mut Core, transitions: &[Transition]) -> usize {
        for transition in transitions {
            match *transition {
                Transition::Paused { resume_at } => core.resume_timer.arm(self.schedule(resume_at)),
                Transition::Resumed => core.resume_timer.disarm(),
                Transition::Opened { close_at } => core.close_timer.arm(self.schedule(close_at)),
                Transition::Closed => core.close_timer.disarm(),
            }
        }

        if transitions.iter().any(Transition::cancels_in_flight) {
            core.inflight.cancel_all()
        } else {
            0
        }
    }

    /// Spawn a one-shot task that re-checks deadlines at `at`.
    /// Without a runtime the deadline is still honoured lazily.
    fn schedule(&self, at: Instant) -> Option<tokio::task::JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let weak = Arc::downgrade(&self.shared);
        Some(handle.spawn(async move {
            tokio::time::sleep_until(at).await;
            if let Some(shared) = weak.upgrade() {
                Guard { shared }.tick();
            }
        }))
    }

    fn report(&self, outcome: Outcome) {
        for transition in &outcome.transitions {
            metrics::record_transition(transition.kind());
            match transition {
                Transition::Paused { .. } => {
                    tracing::warn!(
                        block_threshold = self.shared.config.window.block_threshold,
                        max_requests = self.shared.config.window.max_requests,
                        "Preventive pause activated"
                    )
                }
                Transition::Resumed => tracing::info!("Preventive pause lifted: window reset"),
                Transition::Opened { .. } => tracing::warn!(
                    cooldown_ms = self.shared.config.circuit.cooldown_ms,
                    "Circuit opened: server rate limit detected"
                ),
                Transition::Closed => tracing::info!("Circuit closed: resuming requests"),
            }
        }

        if outcome.cancelled > 0 {
            tracing::warn!(count = outcome.cancelled, "Cancelled in-flight requests");
            metrics::record_cancelled(outcome.cancelled);
        }

        if let Some(snapshot) = outcome.snapshot {
            metrics::record_window_usage(snapshot.percentage_used);
            self.shared.listeners.notify(&snapshot);
        }
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("config", &self.shared.config)
            .field("listeners", &self.shared.listeners)
            .finish()
    }
}
