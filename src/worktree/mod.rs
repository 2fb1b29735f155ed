use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::session::sanitize_branch;

/// Discover the repository root for a path
pub fn repo_root(path: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .arg("-C")
        .arg(path)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
        anyhow::bail!("not a git repository: {:?}", path);
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(root))
}

/// Directory holding all worktrees for a repository, a sibling of the repo root
pub fn worktree_dir(repo_root: &Path) -> PathBuf {
    let repo_name = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());
    let parent = repo_root.parent().unwrap_or(repo_root);
    parent.join(format!("{}-worktrees", repo_name))
}

/// Worktree path for a branch
pub fn path_for(repo_root: &Path, branch: &str) -> PathBuf {
    worktree_dir(repo_root).join(sanitize_branch(branch))
}

/// Whether a worktree directory already exists for the branch
pub fn exists(repo_root: &Path, branch: &str) -> bool {
    path_for(repo_root, branch).is_dir()
}

/// Whether the branch exists locally or on `origin`
pub fn branch_exists(repo_root: &Path, branch: &str) -> Result<bool> {
    let local = show_ref(repo_root, &format!("refs/heads/{}", branch))?;
    if local {
        return Ok(true);
    }
    show_ref(repo_root, &format!("refs/remotes/origin/{}", branch))
}

fn show_ref(repo_root: &Path, reference: &str) -> Result<bool> {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(["show-ref", "--verify", "--quiet", reference])
        .status()
        .context("Failed to execute git show-ref")?;

    match status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => anyhow::bail!("git show-ref failed for {}", reference),
    }
}

/// Create a worktree for the branch, creating the branch itself if absent.
/// Returns the worktree path.
pub fn create(repo_root: &Path, branch: &str) -> Result<PathBuf> {
    let dir = worktree_dir(repo_root);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create worktree directory: {:?}", dir))?;

    let path = path_for(repo_root, branch);
    let branch_present = branch_exists(repo_root, branch)?;

    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo_root).args(["worktree", "add"]);
    if branch_present {
        cmd.arg(&path).arg(branch);
    } else {
        cmd.arg("-b").arg(branch).arg(&path);
    }

    let output = cmd.output().context("Failed to execute git worktree add")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("failed to create worktree: {}", stderr.trim());
    }

    Ok(path)
}

/// Remove the worktree bound to a branch
pub fn remove(repo_root: &Path, branch: &str) -> Result<()> {
    let path = path_for(repo_root, branch);
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(["worktree", "remove"])
        .arg(&path)
        .arg("--force")
        .output()
        .context("Failed to execute git worktree remove")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("failed to remove worktree: {}", stderr.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_worktree_dir_is_repo_sibling() {
        let dir = worktree_dir(Path::new("/home/user/project"));
        assert_eq!(dir, PathBuf::from("/home/user/project-worktrees"));
    }

    #[test]
    fn test_path_for_sanitizes_branch() {
        let path = path_for(Path::new("/home/user/project"), "feature/login");
        assert_eq!(
            path,
            PathBuf::from("/home/user/project-worktrees/feature-login")
        );
    }
}
