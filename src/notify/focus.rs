use std::process::Command;

use super::{FocusProbe, FocusState};

/// Maximum process-ancestry depth walked when correlating a TTY with the
/// focused window
const MAX_ANCESTRY_DEPTH: usize = 20;

/// Focus probe for X11 desktops.
///
/// Correlates the terminal device of an attached client with the currently
/// focused window by walking process ancestry: if any process on the TTY sits
/// in (or shares a non-init ancestor with) the focused window's process tree,
/// the terminal is considered focused. Heuristic by nature; every failure
/// collapses to `Unknown`, which callers treat as "not suppressed".
pub struct X11FocusProbe;

impl FocusProbe for X11FocusProbe {
    fn focus_state(&self, tty: &str) -> FocusState {
        if tty.is_empty() {
            return FocusState::Unknown;
        }

        let active_pid = match active_window_pid() {
            Some(pid) => pid,
            None => return FocusState::Unknown,
        };

        let tty_pids = pids_on_tty(tty);
        if tty_pids.is_empty() {
            return FocusState::Unknown;
        }

        for pid in &tty_pids {
            if is_in_tree(pid, &active_pid) {
                return FocusState::Focused;
            }
        }
        for pid in &tty_pids {
            if shares_terminal_ancestor(pid, &active_pid) {
                return FocusState::Focused;
            }
        }

        FocusState::Unfocused
    }
}

/// PID owning the currently focused window, via xdotool
fn active_window_pid() -> Option<String> {
    let output = Command::new("xdotool")
        .args(["getactivewindow", "getwindowpid"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let pid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if pid.is_empty() {
        None
    } else {
        Some(pid)
    }
}

/// All PIDs attached to a terminal device
fn pids_on_tty(tty: &str) -> Vec<String> {
    let tty_name = tty.strip_prefix("/dev/").unwrap_or(tty);
    let output = match Command::new("ps")
        .args(["-o", "pid=", "-t", tty_name])
        .output()
    {
        Ok(o) if o.status.success() => o,
        _ => return Vec::new(),
    };
    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

fn parent_of(pid: &str) -> Option<String> {
    let output = Command::new("ps")
        .args(["-o", "ppid=", "-p", pid])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let ppid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if ppid.is_empty() {
        None
    } else {
        Some(ppid)
    }
}

/// Whether `pid` appears in the ancestry chain ending at `root_pid`
fn is_in_tree(pid: &str, root_pid: &str) -> bool {
    let mut current = pid.to_string();
    for _ in 0..MAX_ANCESTRY_DEPTH {
        if current == root_pid {
            return true;
        }
        if current.is_empty() || current == "1" || current == "0" {
            break;
        }
        match parent_of(&current) {
            Some(ppid) => current = ppid,
            None => break,
        }
    }
    false
}

/// Whether two PIDs share a common ancestor other than init
fn shares_terminal_ancestor(pid1: &str, pid2: &str) -> bool {
    let ancestors1 = ancestors(pid1);
    let ancestors2 = ancestors(pid2);

    ancestors1
        .iter()
        .any(|a1| a1 != "1" && a1 != "0" && ancestors2.contains(a1))
}

fn ancestors(pid: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = pid.to_string();
    for _ in 0..MAX_ANCESTRY_DEPTH {
        if current.is_empty() || current == "1" || current == "0" {
            break;
        }
        result.push(current.clone());
        match parent_of(&current) {
            Some(ppid) => current = ppid,
            None => break,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tty_is_unknown() {
        let probe = X11FocusProbe;
        assert_eq!(probe.focus_state(""), FocusState::Unknown);
    }
}
