//! Worker-per-channel implementation on OS threads

pub mod channel_thread;

pub use channel_thread::spawn_channel_thread;
