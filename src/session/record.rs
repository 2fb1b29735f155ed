use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Prefix for tmux session names owned by sprig
pub const SESSION_PREFIX: &str = "sprig-";

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    WaitingInput,
    Idle,
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Running => "running",
            SessionStatus::WaitingInput => "waiting_input",
            SessionStatus::Idle => "idle",
            SessionStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A persisted session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque short identifier
    pub id: String,
    /// Branch this session works on
    pub branch: String,
    /// Root of the main repository
    pub repo_path: PathBuf,
    /// Directory the session runs in (worktree or repo root)
    pub worktree_path: PathBuf,
    /// Name of the backing tmux session, derived from the branch
    pub tmux_session: String,
    /// Current status
    pub status: SessionStatus,
    /// Whether the session appears to be waiting on human input
    pub needs_input: bool,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When output last changed
    pub last_activity: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a new record for a branch
    pub fn new(
        branch: impl Into<String>,
        repo_path: impl Into<PathBuf>,
        worktree_path: impl Into<PathBuf>,
    ) -> Self {
        let branch = branch.into();
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let now = Utc::now();

        Self {
            id,
            tmux_session: session_name_for(&branch),
            branch,
            repo_path: repo_path.into(),
            worktree_path: worktree_path.into(),
            status: SessionStatus::Running,
            needs_input: false,
            created_at: now,
            last_activity: now,
        }
    }

    /// Record fresh output activity
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Flip the needs-input flag, keeping status in sync
    pub fn set_needs_input(&mut self, needs: bool) {
        self.needs_input = needs;
        if needs {
            self.status = SessionStatus::WaitingInput;
        } else if self.status == SessionStatus::WaitingInput {
            self.status = SessionStatus::Running;
        }
    }

    /// Whether this session is still subject to monitoring
    pub fn is_live(&self) -> bool {
        self.status != SessionStatus::Stopped
    }
}

/// tmux session name for a branch. A pure function of the branch name.
pub fn session_name_for(branch: &str) -> String {
    format!("{}{}", SESSION_PREFIX, sanitize_branch(branch))
}

/// Replace anything outside `[A-Za-z0-9_-]` with `-`
pub fn sanitize_branch(branch: &str) -> String {
    branch
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
