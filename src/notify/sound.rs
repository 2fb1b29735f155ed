use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Well-known system sounds, tried in order when no override is configured
const DEFAULT_SOUND_PATHS: &[&str] = &[
    "/usr/share/sounds/freedesktop/stereo/complete.oga",
    "/usr/share/sounds/freedesktop/stereo/message.oga",
    "/usr/share/sounds/freedesktop/stereo/bell.oga",
    "/usr/share/sounds/gnome/default/alerts/drip.ogg",
    "/usr/share/sounds/ubuntu/stereo/message.ogg",
];

/// Play an alert sound, preferring the custom path when given
pub fn play(custom: Option<&Path>) -> Result<()> {
    let file = custom
        .map(Path::to_path_buf)
        .or_else(find_default_sound);

    match file {
        Some(path) => play_file(&path),
        None => beep(),
    }
}

fn find_default_sound() -> Option<PathBuf> {
    DEFAULT_SOUND_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn play_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "ogg" | "oga" => {
            if command_exists("paplay") {
                return run_player("paplay", &[path.as_os_str()]);
            }
            if command_exists("ogg123") {
                return run_player("ogg123", &["-q".as_ref(), path.as_os_str()]);
            }
        }
        "wav" => {
            if command_exists("aplay") {
                return run_player("aplay", &["-q".as_ref(), path.as_os_str()]);
            }
            if command_exists("paplay") {
                return run_player("paplay", &[path.as_os_str()]);
            }
        }
        "mp3" => {
            if command_exists("mpg123") {
                return run_player("mpg123", &["-q".as_ref(), path.as_os_str()]);
            }
        }
        _ => {}
    }

    if command_exists("paplay") {
        return run_player("paplay", &[path.as_os_str()]);
    }
    if command_exists("aplay") {
        return run_player("aplay", &["-q".as_ref(), path.as_os_str()]);
    }

    beep()
}

fn run_player(player: &str, args: &[&std::ffi::OsStr]) -> Result<()> {
    let status = Command::new(player)
        .args(args)
        .status()
        .with_context(|| format!("Failed to execute {}", player))?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", player, status);
    }
    Ok(())
}

fn beep() -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(b"\x07").context("Failed to ring bell")?;
    stdout.flush().context("Failed to flush bell")
}

/// Search PATH for an executable
fn command_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(name);
                candidate.is_file()
            })
        })
        .unwrap_or(false)
}
