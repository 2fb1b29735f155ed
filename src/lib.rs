pub mod config;
pub mod monitor;
pub mod notify;
pub mod session;
pub mod tmux;
pub mod worktree;
