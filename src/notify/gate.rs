use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{FocusProbe, FocusState, Notifier};
use crate::config::Settings;
use crate::monitor::PaneInspector;
use crate::session::SessionRecord;

/// Suppression layer in front of the notifier.
///
/// A qualifying waiting-input transition is offered to the gate; each check
/// can veto the alert but never force one. Probes that cannot determine an
/// answer fail open.
pub struct NotificationGate {
    inspector: Arc<dyn PaneInspector>,
    focus: Arc<dyn FocusProbe>,
    notifier: Arc<dyn Notifier>,
    desktop: bool,
    sound: bool,
    sound_file: Option<std::path::PathBuf>,
    idle_threshold: Duration,
    debounce: Duration,
    /// Last dispatched alert per session id
    last_dispatch: HashMap<String, Instant>,
}

impl NotificationGate {
    pub fn new(
        inspector: Arc<dyn PaneInspector>,
        focus: Arc<dyn FocusProbe>,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
    ) -> Self {
        Self {
            inspector,
            focus,
            notifier,
            desktop: settings.notification.desktop,
            sound: settings.notification.sound,
            sound_file: settings.notification.sound_file.clone(),
            idle_threshold: settings.monitor.idle_threshold(),
            debounce: settings.monitor.debounce(),
            last_dispatch: HashMap::new(),
        }
    }

    /// Offer an alert for a session that just crossed the idle threshold.
    /// Returns whether it was dispatched.
    pub fn offer(&mut self, record: &SessionRecord, now: Instant) -> bool {
        // The human is typing even though the visible buffer hasn't changed
        if let Some(secs) = self.inspector.seconds_since_client_input(&record.tmux_session) {
            if Duration::from_secs(secs) <= self.idle_threshold {
                debug!("suppressed alert for '{}': recent keystrokes", record.branch);
                return false;
            }
        }

        // The session is attached and its terminal window holds focus
        if self.inspector.is_attached(&record.tmux_session) {
            if let Some(tty) = self.inspector.attached_client_tty(&record.tmux_session) {
                if self.focus.focus_state(&tty) == FocusState::Focused {
                    debug!("suppressed alert for '{}': terminal focused", record.branch);
                    return false;
                }
            }
        }

        // Debounce against the previous dispatched alert for this session
        if let Some(prev) = self.last_dispatch.get(&record.id) {
            if now.duration_since(*prev) < self.debounce {
                debug!("suppressed alert for '{}': within debounce window", record.branch);
                return false;
            }
        }

        self.last_dispatch.insert(record.id.clone(), now);
        self.dispatch(record);
        true
    }

    /// Drop the debounce clock for a removed session
    pub fn forget(&mut self, id: &str) {
        self.last_dispatch.remove(id);
    }

    fn dispatch(&self, record: &SessionRecord) {
        if self.desktop {
            let body = format!("Branch '{}' is waiting for input", record.branch);
            if let Err(e) = self.notifier.notify_desktop("sprig: input required", &body) {
                warn!("desktop notification failed: {:#}", e);
            }
        }
        if self.sound {
            if let Err(e) = self.notifier.play_sound(self.sound_file.as_deref()) {
                warn!("sound alert failed: {:#}", e);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate_dispatch(&mut self, id: &str, when: Instant) {
        self.last_dispatch.insert(id.to_string(), when);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use parking_lot::Mutex;
    use std::path::Path;

    struct MockInspector {
        seconds_since_input: Option<u64>,
        attached: bool,
        tty: Option<String>,
    }

    impl Default for MockInspector {
        fn default() -> Self {
            Self {
                seconds_since_input: None,
                attached: false,
                tty: None,
            }
        }
    }

    impl PaneInspector for MockInspector {
        fn session_exists(&self, _session: &str) -> bool {
            true
        }
        fn capture(&self, _session: &str, _lines: u32) -> Result<String> {
            Ok(String::new())
        }
        fn is_attached(&self, _session: &str) -> bool {
            self.attached
        }
        fn attached_client_tty(&self, _session: &str) -> Option<String> {
            self.tty.clone()
        }
        fn seconds_since_client_input(&self, _session: &str) -> Option<u64> {
            self.seconds_since_input
        }
    }

    struct FixedFocus(FocusState);

    impl FocusProbe for FixedFocus {
        fn focus_state(&self, _tty: &str) -> FocusState {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        desktop: Mutex<Vec<String>>,
        sounds: Mutex<usize>,
    }

    impl Notifier for RecordingNotifier {
        fn notify_desktop(&self, _title: &str, body: &str) -> Result<()> {
            self.desktop.lock().push(body.to_string());
            Ok(())
        }
        fn play_sound(&self, _override_path: Option<&Path>) -> Result<()> {
            *self.sounds.lock() += 1;
            Ok(())
        }
    }

    fn gate_with(
        inspector: MockInspector,
        focus: FocusState,
    ) -> (NotificationGate, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let gate = NotificationGate::new(
            Arc::new(inspector),
            Arc::new(FixedFocus(focus)),
            notifier.clone(),
            &Settings::default(),
        );
        (gate, notifier)
    }

    fn record() -> SessionRecord {
        SessionRecord::new("feature/x", "/repo", "/repo")
    }

    #[test]
    fn test_dispatches_when_nothing_suppresses() {
        let (mut gate, notifier) = gate_with(MockInspector::default(), FocusState::Unknown);
        assert!(gate.offer(&record(), Instant::now()));
        assert_eq!(notifier.desktop.lock().len(), 1);
        assert_eq!(*notifier.sounds.lock(), 1);
    }

    #[test]
    fn test_recent_keystrokes_suppress() {
        let inspector = MockInspector {
            seconds_since_input: Some(1), // within the 2s idle threshold
            ..MockInspector::default()
        };
        let (mut gate, notifier) = gate_with(inspector, FocusState::Unknown);
        assert!(!gate.offer(&record(), Instant::now()));
        assert!(notifier.desktop.lock().is_empty());
    }

    #[test]
    fn test_old_keystrokes_do_not_suppress() {
        let inspector = MockInspector {
            seconds_since_input: Some(120),
            ..MockInspector::default()
        };
        let (mut gate, _) = gate_with(inspector, FocusState::Unknown);
        assert!(gate.offer(&record(), Instant::now()));
    }

    #[test]
    fn test_focused_terminal_suppresses() {
        let inspector = MockInspector {
            attached: true,
            tty: Some("/dev/pts/3".to_string()),
            ..MockInspector::default()
        };
        let (mut gate, _) = gate_with(inspector, FocusState::Focused);
        assert!(!gate.offer(&record(), Instant::now()));
    }

    #[test]
    fn test_unfocused_and_unknown_fail_open() {
        for state in [FocusState::Unfocused, FocusState::Unknown] {
            let inspector = MockInspector {
                attached: true,
                tty: Some("/dev/pts/3".to_string()),
                ..MockInspector::default()
            };
            let (mut gate, _) = gate_with(inspector, state);
            assert!(gate.offer(&record(), Instant::now()), "{:?} must not suppress", state);
        }
    }

    #[test]
    fn test_detached_session_ignores_focus() {
        let inspector = MockInspector {
            attached: false,
            tty: None,
            ..MockInspector::default()
        };
        let (mut gate, _) = gate_with(inspector, FocusState::Focused);
        assert!(gate.offer(&record(), Instant::now()));
    }

    #[test]
    fn test_debounce_window() {
        let (mut gate, notifier) = gate_with(MockInspector::default(), FocusState::Unknown);
        let rec = record();
        let now = Instant::now();

        assert!(gate.offer(&rec, now));
        // A second qualifying event 10s later sits inside the 30s window
        assert!(!gate.offer(&rec, now + Duration::from_secs(10)));
        // Outside the window it dispatches again
        assert!(gate.offer(&rec, now + Duration::from_secs(31)));
        assert_eq!(notifier.desktop.lock().len(), 2);
    }

    #[test]
    fn test_debounce_is_per_session() {
        let (mut gate, _) = gate_with(MockInspector::default(), FocusState::Unknown);
        let now = Instant::now();
        assert!(gate.offer(&record(), now));
        assert!(gate.offer(&record(), now)); // different id
    }

    #[test]
    fn test_forget_clears_debounce() {
        let (mut gate, _) = gate_with(MockInspector::default(), FocusState::Unknown);
        let rec = record();
        let now = Instant::now();
        assert!(gate.offer(&rec, now));
        gate.forget(&rec.id);
        assert!(gate.offer(&rec, now + Duration::from_secs(1)));
    }

    #[test]
    fn test_toggles_disable_channels() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut settings = Settings::default();
        settings.notification.desktop = false;
        let mut gate = NotificationGate::new(
            Arc::new(MockInspector::default()),
            Arc::new(FixedFocus(FocusState::Unknown)),
            notifier.clone(),
            &settings,
        );

        assert!(gate.offer(&record(), Instant::now()));
        assert!(notifier.desktop.lock().is_empty());
        assert_eq!(*notifier.sounds.lock(), 1);
    }
}
