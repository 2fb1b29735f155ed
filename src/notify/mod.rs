mod desktop;
mod focus;
mod gate;
mod sound;

pub use focus::X11FocusProbe;
pub use gate::NotificationGate;

use anyhow::Result;
use std::path::Path;

/// Focus answer for a terminal window. `Unknown` never suppresses an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    Focused,
    Unfocused,
    Unknown,
}

/// Capability answering whether the window owning a terminal device has OS
/// input focus
pub trait FocusProbe: Send + Sync {
    fn focus_state(&self, tty: &str) -> FocusState;
}

/// Boundary dispatching the actual alerts. Failures are non-fatal to callers.
pub trait Notifier: Send + Sync {
    fn notify_desktop(&self, title: &str, body: &str) -> Result<()>;
    fn play_sound(&self, override_path: Option<&Path>) -> Result<()>;
}

/// Notifier backed by the desktop environment (notify-send + audio players)
pub struct SystemNotifier;

impl Notifier for SystemNotifier {
    fn notify_desktop(&self, title: &str, body: &str) -> Result<()> {
        desktop::send(title, body)
    }

    fn play_sound(&self, override_path: Option<&Path>) -> Result<()> {
        sound::play(override_path)
    }
}
