use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Branch-scoped tmux session manager")]
pub struct Config {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Polling interval in milliseconds
    #[arg(short = 'i', long, global = true)]
    pub poll_interval: Option<u64>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start a session, optionally on a branch with its own worktree
    Start {
        /// Branch to work on (defaults to the current directory, no worktree)
        branch: Option<String>,

        /// Don't create a worktree, run in the repository root
        #[arg(long)]
        no_worktree: bool,

        /// Initial prompt typed into the session once it is up
        #[arg(short, long)]
        prompt: Option<String>,

        /// Start in the background instead of attaching
        #[arg(short, long)]
        detach: bool,
    },
    /// Stop a session
    Stop {
        /// Branch whose session to stop
        branch: Option<String>,

        /// Stop all sessions
        #[arg(long)]
        all: bool,

        /// Also remove the linked worktree
        #[arg(long)]
        remove_worktree: bool,
    },
    /// Attach to a running session
    #[command(alias = "a")]
    Attach {
        /// Branch whose session to attach to
        branch: String,
    },
    /// List all sessions
    #[command(alias = "ls")]
    List,
    /// Remove records whose tmux session no longer exists
    Cleanup,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the background monitor (auto-spawned by `start`)
    #[command(hide = true)]
    Monitor,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set { key: String, value: String },
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Notification settings
    #[serde(default)]
    pub notification: NotificationSettings,

    /// Monitor tunables
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Session settings
    #[serde(default)]
    pub session: SessionSettings,
}

/// Notification toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Send desktop notifications
    #[serde(default = "default_desktop")]
    pub desktop: bool,

    /// Play a sound alert
    #[serde(default = "default_sound")]
    pub sound: bool,

    /// Custom sound file (falls back to system sounds when unset)
    #[serde(default)]
    pub sound_file: Option<PathBuf>,
}

fn default_desktop() -> bool {
    true
}

fn default_sound() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            desktop: default_desktop(),
            sound: default_sound(),
            sound_file: None,
        }
    }
}

/// Monitor tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Polling interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Seconds of unchanged output before a session counts as idle
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: u64,

    /// Minimum gap between two alerts for the same session
    #[serde(default = "default_debounce")]
    pub debounce_secs: u64,

    /// Number of lines to capture from the pane
    #[serde(default = "default_capture_lines")]
    pub capture_lines: u32,

    /// Extra prompt patterns (regex), appended after the built-ins
    #[serde(default)]
    pub prompt_patterns: Vec<String>,
}

fn default_poll_interval() -> u64 {
    500
}

fn default_idle_threshold() -> u64 {
    2
}

fn default_debounce() -> u64 {
    30
}

fn default_capture_lines() -> u32 {
    50
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            idle_threshold_secs: default_idle_threshold(),
            debounce_secs: default_debounce(),
            capture_lines: default_capture_lines(),
            prompt_patterns: Vec::new(),
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Command launched inside each new tmux session
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_command() -> String {
    "claude".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        let default_path = super::config_path();
        if default_path.exists() {
            let content = std::fs::read_to_string(&default_path)
                .with_context(|| format!("Failed to read config file: {:?}", default_path))?;
            return toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", default_path));
        }

        Ok(Self::default())
    }

    /// Write settings to the default config file
    pub fn save(&self) -> Result<()> {
        let path = super::config_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(poll_interval) = cli.poll_interval {
            self.monitor.poll_interval_ms = poll_interval;
        }
    }

    /// Validate and normalize settings values
    ///
    /// Ensures the poll interval has a minimum value to prevent CPU exhaustion.
    pub fn validate(&mut self) {
        const MIN_POLL_INTERVAL: u64 = 50;

        if self.monitor.poll_interval_ms < MIN_POLL_INTERVAL {
            self.monitor.poll_interval_ms = MIN_POLL_INTERVAL;
        }
    }

    /// Set a configuration value by dotted key
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "notification.desktop" => self.notification.desktop = parse_bool(key, value)?,
            "notification.sound" => self.notification.sound = parse_bool(key, value)?,
            "notification.sound_file" => {
                self.notification.sound_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "monitor.poll_interval_ms" => self.monitor.poll_interval_ms = parse_u64(key, value)?,
            "monitor.idle_threshold_secs" => {
                self.monitor.idle_threshold_secs = parse_u64(key, value)?
            }
            "monitor.debounce_secs" => self.monitor.debounce_secs = parse_u64(key, value)?,
            "monitor.capture_lines" => self.monitor.capture_lines = parse_u64(key, value)? as u32,
            "session.command" => self.session.command = value.to_string(),
            _ => anyhow::bail!("unknown config key: {}", key),
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .with_context(|| format!("invalid boolean for {}: {}", key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("invalid number for {}: {}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.monitor.poll_interval_ms, 500);
        assert_eq!(settings.monitor.idle_threshold_secs, 2);
        assert_eq!(settings.monitor.debounce_secs, 30);
        assert_eq!(settings.monitor.capture_lines, 50);
        assert!(settings.notification.desktop);
        assert!(settings.notification.sound);
        assert_eq!(settings.session.command, "claude");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [monitor]
            poll_interval_ms = 1000
            idle_threshold_secs = 5
            prompt_patterns = ["Overwrite .*\\?"]

            [notification]
            sound = false
        "#;

        let settings: Settings = toml::from_str(toml).expect("Should parse TOML");
        assert_eq!(settings.monitor.poll_interval_ms, 1000);
        assert_eq!(settings.monitor.idle_threshold_secs, 5);
        assert_eq!(settings.monitor.debounce_secs, 30);
        assert_eq!(settings.monitor.prompt_patterns, vec!["Overwrite .*\\?"]);
        assert!(!settings.notification.sound);
        assert!(settings.notification.desktop);
    }

    #[test]
    fn test_validate_clamps_poll_interval() {
        let mut settings = Settings::default();
        settings.monitor.poll_interval_ms = 0;
        settings.validate();
        assert_eq!(settings.monitor.poll_interval_ms, 50);
    }

    #[test]
    fn test_set_key() {
        let mut settings = Settings::default();
        settings
            .set_key("notification.desktop", "false")
            .expect("Should set bool");
        assert!(!settings.notification.desktop);

        settings
            .set_key("monitor.debounce_secs", "60")
            .expect("Should set number");
        assert_eq!(settings.monitor.debounce_secs, 60);

        assert!(settings.set_key("bogus.key", "1").is_err());
        assert!(settings.set_key("notification.sound", "maybe").is_err());
    }
}
