use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::Settings;
use crate::session::{SessionRecord, SessionStatus, Store};
use crate::tmux::TmuxClient;
use crate::worktree;

/// Foreground session lifecycle operations: start, stop, attach, list,
/// cleanup. Shares the registry with the background monitor.
pub struct Manager {
    store: Arc<Store>,
    tmux: TmuxClient,
    command: String,
}

impl Manager {
    pub fn new(store: Arc<Store>, settings: &Settings) -> Self {
        Self {
            store,
            tmux: TmuxClient::new(),
            command: settings.session.command.clone(),
        }
    }

    /// Start a session for a branch. With `create_worktree`, the session runs
    /// in a linked worktree (reused if one already exists); otherwise it runs
    /// in the repository root. An initial prompt, if given, is typed into the
    /// session once it is up.
    pub fn start(
        &self,
        branch: &str,
        cwd: &Path,
        create_worktree: bool,
        initial_prompt: Option<&str>,
    ) -> Result<SessionRecord> {
        if !self.tmux.is_available() {
            bail!("tmux is not available; is the tmux server installed and running?");
        }

        if let Some(existing) = self.store.find_by_branch(branch) {
            if self.tmux.session_exists(&existing.tmux_session) {
                bail!("session for branch '{}' already exists", branch);
            }
            // Stale record from a dead session; prune before replacing
            debug!("pruning stale record for branch '{}'", branch);
            self.store.remove(&existing.id)?;
        }

        let repo_root = worktree::repo_root(cwd)?;

        let session_path = if create_worktree {
            if worktree::exists(&repo_root, branch) {
                worktree::path_for(&repo_root, branch)
            } else {
                worktree::create(&repo_root, branch).context("failed to create worktree")?
            }
        } else {
            repo_root.clone()
        };

        let record = SessionRecord::new(branch, repo_root, session_path.clone());

        self.tmux
            .create_session(&record.tmux_session, &session_path, Some(&self.command))
            .context("failed to create tmux session")?;

        if let Err(e) = self.store.add(record.clone()) {
            // Don't leave an orphaned tmux session behind
            let _ = self.tmux.kill_session(&record.tmux_session);
            return Err(e);
        }

        if let Some(prompt) = initial_prompt {
            if let Err(e) = self.tmux.send_keys(&record.tmux_session, prompt) {
                debug!("failed to send initial prompt to '{}': {:#}", branch, e);
            }
        }

        Ok(record)
    }

    /// Stop the session for a branch, optionally removing its worktree
    pub fn stop(&self, branch: &str, remove_worktree: bool) -> Result<()> {
        let record = self
            .store
            .find_by_branch(branch)
            .with_context(|| format!("no session found for branch '{}'", branch))?;

        if self.tmux.session_exists(&record.tmux_session) {
            self.tmux
                .kill_session(&record.tmux_session)
                .context("failed to kill tmux session")?;
        }

        if remove_worktree && record.worktree_path != record.repo_path {
            if let Err(e) = worktree::remove(&record.repo_path, &record.branch) {
                debug!("worktree removal failed for '{}': {:#}", branch, e);
            }
        }

        self.store.remove(&record.id)
    }

    /// Stop every session. Continues past individual failures and returns
    /// the last error, if any.
    pub fn stop_all(&self, remove_worktrees: bool) -> Result<()> {
        let mut last_err = Ok(());
        for record in self.store.get_all() {
            if let Err(e) = self.stop(&record.branch, remove_worktrees) {
                last_err = Err(e);
            }
        }
        last_err
    }

    /// Attach to a branch's session, pruning the record if it has vanished
    pub fn attach(&self, branch: &str) -> Result<()> {
        let record = self
            .store
            .find_by_branch(branch)
            .with_context(|| format!("no session found for branch '{}'", branch))?;

        if !self.tmux.session_exists(&record.tmux_session) {
            self.store.remove(&record.id)?;
            bail!("tmux session no longer exists");
        }

        self.tmux.attach_session(&record.tmux_session)
    }

    /// Snapshot of all sessions, with vanished ones reported as stopped.
    /// The stopped marking is display-only and not persisted here; the
    /// monitor owns that transition.
    pub fn list(&self) -> Vec<SessionRecord> {
        let mut records = self.store.get_all();
        for record in &mut records {
            if record.is_live() && !self.tmux.session_exists(&record.tmux_session) {
                record.status = SessionStatus::Stopped;
            }
        }
        records
    }

    /// Remove records whose backing tmux session no longer exists.
    /// Returns how many were removed.
    pub fn cleanup(&self) -> Result<usize> {
        let mut removed = 0;
        for record in self.store.get_all() {
            if !self.tmux.session_exists(&record.tmux_session) {
                self.store.remove(&record.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
