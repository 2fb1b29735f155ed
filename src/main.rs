use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::process::Stdio;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sprig::config::{self, Command, Config, ConfigAction, Settings};
use sprig::monitor::{Monitor, PaneInspector, PromptClassifier};
use sprig::notify::{NotificationGate, SystemNotifier, X11FocusProbe};
use sprig::session::{Manager, Store};
use sprig::tmux::TmuxClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Config::parse_args();

    setup_logging(cli.debug);

    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    match cli.command.clone() {
        Command::Start {
            branch,
            no_worktree,
            prompt,
            detach,
        } => cmd_start(&settings, branch, no_worktree, prompt.as_deref(), detach),
        Command::Stop {
            branch,
            all,
            remove_worktree,
        } => cmd_stop(&settings, branch, all, remove_worktree),
        Command::Attach { branch } => cmd_attach(&settings, &branch),
        Command::List => cmd_list(&settings),
        Command::Cleanup => cmd_cleanup(&settings),
        Command::Config { action } => cmd_config(settings, action),
        Command::Monitor => run_monitor(settings).await,
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("sprig=debug")
    } else {
        EnvFilter::new("sprig=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn open_store() -> Result<Arc<Store>> {
    Ok(Arc::new(Store::open(config::sessions_path())?))
}

fn cmd_start(
    settings: &Settings,
    branch: Option<String>,
    no_worktree: bool,
    prompt: Option<&str>,
    detach: bool,
) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let (branch, create_worktree) = match branch {
        Some(branch) => (branch, !no_worktree),
        None => {
            // No branch given: run in the current directory under its name
            let name = cwd
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "session".to_string());
            (name, false)
        }
    };

    let manager = Manager::new(open_store()?, settings);
    let record = manager.start(&branch, &cwd, create_worktree, prompt)?;

    println!("Started session '{}'", record.branch);
    println!("  directory: {}", record.worktree_path.display());
    println!("  tmux:      {}", record.tmux_session);

    match spawn_monitor() {
        Ok(()) => println!("  monitor:   started (notifications enabled)"),
        Err(e) => eprintln!("warning: failed to start monitor: {:#}", e),
    }

    if detach {
        println!(
            "\nSession running in background. Use 'sprig attach {}' to attach.",
            record.branch
        );
        Ok(())
    } else {
        println!("\nAttaching to session... (detach with Ctrl+B, D)");
        manager.attach(&record.branch)
    }
}

fn cmd_stop(
    settings: &Settings,
    branch: Option<String>,
    all: bool,
    remove_worktree: bool,
) -> Result<()> {
    let manager = Manager::new(open_store()?, settings);

    if all {
        manager.stop_all(remove_worktree)?;
        println!("All sessions stopped");
        return Ok(());
    }

    let branch = match branch {
        Some(branch) => branch,
        None => bail!("branch name required (or use --all)"),
    };

    manager.stop(&branch, remove_worktree)?;
    println!("Session for branch '{}' stopped", branch);
    Ok(())
}

fn cmd_attach(settings: &Settings, branch: &str) -> Result<()> {
    Manager::new(open_store()?, settings).attach(branch)
}

fn cmd_list(settings: &Settings) -> Result<()> {
    let manager = Manager::new(open_store()?, settings);
    let records = manager.list();

    if records.is_empty() {
        println!("No active sessions");
        return Ok(());
    }

    println!(
        "{:<24} {:<16} {:<42} {}",
        "BRANCH", "STATUS", "WORKTREE", "LAST ACTIVITY"
    );
    println!("{}", "-".repeat(100));

    for record in records {
        let status = if record.needs_input {
            format!("⚠ {}", record.status)
        } else {
            record.status.to_string()
        };

        println!(
            "{:<24} {:<16} {:<42} {}",
            record.branch,
            status,
            truncate_path(&record.worktree_path.to_string_lossy(), 40),
            humanize_last_activity(record.last_activity),
        );
    }

    Ok(())
}

fn cmd_cleanup(settings: &Settings) -> Result<()> {
    let removed = Manager::new(open_store()?, settings).cleanup()?;
    if removed == 0 {
        println!("No stale sessions found");
    } else {
        println!("Removed {} stale session(s)", removed);
    }
    Ok(())
}

fn cmd_config(mut settings: Settings, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("notification.desktop: {}", settings.notification.desktop);
            println!("notification.sound: {}", settings.notification.sound);
            println!(
                "notification.sound_file: {}",
                settings
                    .notification
                    .sound_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
            println!(
                "monitor.poll_interval_ms: {}",
                settings.monitor.poll_interval_ms
            );
            println!(
                "monitor.idle_threshold_secs: {}",
                settings.monitor.idle_threshold_secs
            );
            println!("monitor.debounce_secs: {}", settings.monitor.debounce_secs);
            println!("monitor.capture_lines: {}", settings.monitor.capture_lines);
            println!(
                "monitor.prompt_patterns: {}",
                settings.monitor.prompt_patterns.join(", ")
            );
            println!("session.command: {}", settings.session.command);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            settings.set_key(&key, &value)?;
            settings.save()?;
            println!("Set {} = {}", key, value);
            Ok(())
        }
    }
}

/// Run the monitor daemon in the foreground until SIGINT/SIGTERM
async fn run_monitor(settings: Settings) -> Result<()> {
    let store = open_store()?;
    let inspector: Arc<dyn PaneInspector> = Arc::new(TmuxClient::new());

    let classifier = Arc::new(PromptClassifier::new());
    for pattern in &settings.monitor.prompt_patterns {
        if let Err(e) = classifier.register(pattern) {
            tracing::warn!("skipping prompt pattern {:?}: {:#}", pattern, e);
        }
    }
    let gate = NotificationGate::new(
        inspector.clone(),
        Arc::new(X11FocusProbe),
        Arc::new(SystemNotifier),
        &settings,
    );

    let monitor = Monitor::new(
        store,
        inspector,
        classifier,
        gate,
        settings.monitor.clone(),
    );
    let handle = monitor.start();

    wait_for_shutdown().await?;
    handle.stop().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to wait for ctrl-c")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for ctrl-c")
}

/// Spawn the background monitor as a detached child in its own process group
fn spawn_monitor() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate executable")?;

    let mut cmd = std::process::Command::new(exe);
    cmd.arg("monitor")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd.spawn().context("Failed to spawn monitor")?;
    Ok(())
}

fn humanize_last_activity(ts: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(ts);
    let secs = elapsed.num_seconds();
    if (0..60).contains(&secs) {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        ts.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }
    let tail: String = path
        .chars()
        .rev()
        .take(max_len - 3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{}", tail)
}
