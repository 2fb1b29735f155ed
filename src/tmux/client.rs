use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::monitor::PaneInspector;

/// Client for interacting with tmux
pub struct TmuxClient;

impl TmuxClient {
    pub fn new() -> Self {
        Self
    }

    /// Check if the tmux binary is present. A server does not have to be
    /// running; new-session starts one.
    pub fn is_available(&self) -> bool {
        Command::new("tmux")
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Check whether a named session exists.
    ///
    /// tmux exits 1 when the session is missing; any other failure (no server,
    /// binary missing) is also treated as "gone", which drives the caller's
    /// stopped transition.
    pub fn session_exists(&self, name: &str) -> bool {
        match Command::new("tmux")
            .args(["has-session", "-t", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("tmux has-session failed for {}: {}", name, e);
                false
            }
        }
    }

    /// Create a detached session running `command` in `cwd`
    pub fn create_session(&self, name: &str, cwd: &Path, command: Option<&str>) -> Result<()> {
        let mut cmd = Command::new("tmux");
        cmd.args(["new-session", "-d", "-s", name, "-c"]).arg(cwd);
        if let Some(command) = command {
            cmd.arg(command);
        }

        let output = cmd.output().context("Failed to execute tmux new-session")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux new-session failed: {}", stderr);
        }

        // Mouse support for scrollback inside the session
        if let Err(e) = self.set_option(name, "mouse", "on") {
            debug!("failed to enable mouse for {}: {}", name, e);
        }

        Ok(())
    }

    /// Set a session option
    pub fn set_option(&self, name: &str, option: &str, value: &str) -> Result<()> {
        let output = Command::new("tmux")
            .args(["set-option", "-t", name, option, value])
            .output()
            .context("Failed to execute tmux set-option")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux set-option failed for {}: {}", name, stderr);
        }
        Ok(())
    }

    /// Kill a session
    pub fn kill_session(&self, name: &str) -> Result<()> {
        let output = Command::new("tmux")
            .args(["kill-session", "-t", name])
            .output()
            .context("Failed to execute tmux kill-session")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux kill-session failed for {}: {}", name, stderr);
        }
        Ok(())
    }

    /// Attach to a session, inheriting this process's terminal
    pub fn attach_session(&self, name: &str) -> Result<()> {
        let status = Command::new("tmux")
            .args(["attach-session", "-t", name])
            .status()
            .context("Failed to execute tmux attach-session")?;

        if !status.success() {
            anyhow::bail!("tmux attach-session failed for {}", name);
        }
        Ok(())
    }

    /// Capture the last `lines` lines of the session's active pane
    pub fn capture_pane(&self, name: &str, lines: u32) -> Result<String> {
        let start_line = format!("-{}", lines);
        let output = Command::new("tmux")
            .args(["capture-pane", "-t", name, "-p", "-S", &start_line])
            .output()
            .context("Failed to execute tmux capture-pane")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux capture-pane failed for {}: {}", name, stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Send a line of keys followed by Enter
    pub fn send_keys(&self, name: &str, keys: &str) -> Result<()> {
        let output = Command::new("tmux")
            .args(["send-keys", "-t", name, keys, "Enter"])
            .output()
            .context("Failed to execute tmux send-keys")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux send-keys failed for {}: {}", name, stderr);
        }
        Ok(())
    }

    fn list_clients(&self, name: &str, format: &str) -> Option<String> {
        let output = Command::new("tmux")
            .args(["list-clients", "-t", name, "-F", format])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            None
        } else {
            Some(stdout)
        }
    }
}

impl PaneInspector for TmuxClient {
    fn session_exists(&self, session: &str) -> bool {
        TmuxClient::session_exists(self, session)
    }

    fn capture(&self, session: &str, lines: u32) -> Result<String> {
        self.capture_pane(session, lines)
    }

    fn is_attached(&self, session: &str) -> bool {
        self.list_clients(session, "#{client_tty}").is_some()
    }

    fn attached_client_tty(&self, session: &str) -> Option<String> {
        let ttys = self.list_clients(session, "#{client_tty}")?;
        ttys.lines().next().map(|s| s.trim().to_string())
    }

    fn seconds_since_client_input(&self, session: &str) -> Option<u64> {
        let activity = self.list_clients(session, "#{client_activity}")?;
        let timestamp: i64 = activity.lines().next()?.trim().parse().ok()?;
        let now = chrono::Utc::now().timestamp();
        Some(now.saturating_sub(timestamp).max(0) as u64)
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}
