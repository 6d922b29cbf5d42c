pub mod history_store;
pub mod job_store;
pub mod session_manager;
pub mod ssh_transport;
pub mod transport;
pub mod webhook_notifier;
