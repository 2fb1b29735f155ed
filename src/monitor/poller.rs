use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::patterns::tail_lines;
use super::{PaneInspector, PromptClassifier};
use crate::config::MonitorSettings;
use crate::notify::NotificationGate;
use crate::session::{SessionRecord, SessionStatus, Store};

/// How many trailing lines the classifier sees. Bounded so stale prompts in
/// scrollback can't trigger alerts.
const PROMPT_WINDOW_LINES: usize = 5;

/// Ephemeral per-session monitoring state. Never persisted.
struct MonitorState {
    /// Last captured output snapshot
    last_output: String,
    /// When the output last changed
    last_change: Instant,
    /// Whether this idle stretch has already produced an alert
    notified: bool,
    /// Whether output has ever been observed changing
    was_active: bool,
}

impl MonitorState {
    fn new(now: Instant) -> Self {
        Self {
            last_output: String::new(),
            last_change: now,
            notified: false,
            was_active: false,
        }
    }
}

/// Background monitor driving the per-session state machine.
///
/// A single task polls at a fixed interval; each tick runs one sequential
/// inspection pass over a registry snapshot. Detection is edge-triggered on
/// the idle-threshold crossing: one alert per uninterrupted idle stretch,
/// re-armed only by an output change.
pub struct Monitor {
    store: Arc<Store>,
    inspector: Arc<dyn PaneInspector>,
    classifier: Arc<PromptClassifier>,
    gate: NotificationGate,
    settings: MonitorSettings,
    states: HashMap<String, MonitorState>,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        inspector: Arc<dyn PaneInspector>,
        classifier: Arc<PromptClassifier>,
        gate: NotificationGate,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            inspector,
            classifier,
            gate,
            settings,
            states: HashMap::new(),
        }
    }

    /// Spawn the polling loop. The returned handle stops it.
    pub fn start(self) -> MonitorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        MonitorHandle { stop_tx, task }
    }

    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        info!(
            "monitor started (poll {}ms, idle {}s, debounce {}s)",
            self.settings.poll_interval_ms,
            self.settings.idle_threshold_secs,
            self.settings.debounce_secs
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval());
        // An overrunning pass just starts the next tick late
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_pass(Instant::now());
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("monitor stopped");
    }

    /// One inspection pass over all non-stopped sessions
    fn run_pass(&mut self, now: Instant) {
        let records = self.store.get_all();

        // Drop ephemeral state for sessions removed from the registry
        self.states
            .retain(|id, _| records.iter().any(|r| r.id == *id && r.is_live()));
        for record in &records {
            if !record.is_live() {
                self.gate.forget(&record.id);
            }
        }

        for record in records {
            if !record.is_live() {
                continue;
            }
            self.inspect_session(record, now);
        }
    }

    /// State machine transition for one session
    fn inspect_session(&mut self, mut record: SessionRecord, now: Instant) {
        // Backing session gone: terminal state
        if !self.inspector.session_exists(&record.tmux_session) {
            debug!("session '{}' vanished, marking stopped", record.branch);
            record.status = SessionStatus::Stopped;
            if let Err(e) = self.store.update(&record) {
                warn!("failed to persist stopped session '{}': {:#}", record.branch, e);
            }
            self.states.remove(&record.id);
            self.gate.forget(&record.id);
            return;
        }

        // Capture failure degrades to skipping this session this tick
        let output = match self
            .inspector
            .capture(&record.tmux_session, self.settings.capture_lines)
        {
            Ok(output) => output,
            Err(e) => {
                debug!("capture failed for '{}': {:#}", record.branch, e);
                return;
            }
        };

        let state = self
            .states
            .entry(record.id.clone())
            .or_insert_with(|| MonitorState::new(now));

        // Any output change, including partial redraws, re-arms detection
        if output != state.last_output {
            state.last_output = output;
            state.last_change = now;
            state.notified = false;
            state.was_active = true;

            record.set_needs_input(false);
            record.status = SessionStatus::Running;
            record.touch();
            if let Err(e) = self.store.update(&record) {
                warn!("failed to persist activity for '{}': {:#}", record.branch, e);
            }
            return;
        }

        // Unchanged output: check for the idle-threshold crossing
        let idle = now.duration_since(state.last_change);
        if idle <= self.settings.idle_threshold() || !state.was_active || state.notified {
            return;
        }

        let tail = tail_lines(&state.last_output, PROMPT_WINDOW_LINES);
        if !self.classifier.matches(&tail) {
            return;
        }

        // Edge consumed: notified is set whether or not the gate dispatches
        state.notified = true;
        record.set_needs_input(true);
        if let Err(e) = self.store.update(&record) {
            warn!("failed to persist waiting state for '{}': {:#}", record.branch, e);
        }

        if self.gate.offer(&record, now) {
            info!("alerted: session '{}' is waiting for input", record.branch);
        }
    }
}

/// Handle for stopping a running monitor. Stop is one-shot; it waits for any
/// in-flight pass to finish.
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}
