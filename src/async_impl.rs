//! Task-per-channel implementation on a tokio runtime

pub mod channel_task;

pub use channel_task::channel_task;
