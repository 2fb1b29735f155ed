mod patterns;
mod poller;

pub use patterns::PromptClassifier;
pub use poller::{Monitor, MonitorHandle};

use anyhow::Result;

/// Boundary to the terminal multiplexer hosting the sessions.
///
/// The monitor only consumes result contracts; how the answers are obtained
/// is the implementor's business. Probe-style methods return `Option` where
/// the answer can be unknowable, and the callers fail open on `None`.
pub trait PaneInspector: Send + Sync {
    /// Whether the backing session still exists
    fn session_exists(&self, session: &str) -> bool;

    /// Capture the last `lines` lines of visible output
    fn capture(&self, session: &str, lines: u32) -> Result<String>;

    /// Whether any client is currently attached
    fn is_attached(&self, session: &str) -> bool;

    /// Terminal device of the attached client, if any
    fn attached_client_tty(&self, session: &str) -> Option<String>;

    /// Seconds since the attached client last sent input, if known
    fn seconds_since_client_input(&self, session: &str) -> Option<u64>;
}
