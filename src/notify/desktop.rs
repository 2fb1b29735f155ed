use anyhow::{Context, Result};
use std::process::Command;

/// Send a desktop banner via notify-send
pub fn send(title: &str, body: &str) -> Result<()> {
    let status = Command::new("notify-send")
        .args(["-a", "sprig", "-u", "normal", title, body])
        .status()
        .context("Failed to execute notify-send")?;

    if !status.success() {
        anyhow::bail!("notify-send exited with {}", status);
    }
    Ok(())
}
