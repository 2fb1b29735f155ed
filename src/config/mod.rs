mod settings;

pub use settings::{
    Command, Config, ConfigAction, MonitorSettings, NotificationSettings, SessionSettings,
    Settings,
};

use std::path::PathBuf;

/// Configuration directory (`$XDG_CONFIG_HOME/sprig` or `~/.config/sprig`)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("sprig"))
        .unwrap_or_else(|| PathBuf::from(".sprig"))
}

/// Path of the persisted session registry
pub fn sessions_path() -> PathBuf {
    config_dir().join("sessions.json")
}

/// Path of the configuration file
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
