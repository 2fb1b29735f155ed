mod manager;
mod record;
mod store;

pub use manager::Manager;
pub use record::{sanitize_branch, session_name_for, SessionRecord, SessionStatus};
pub use store::Store;
