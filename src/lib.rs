pub mod audio;
pub mod channel;
pub mod config;
pub mod ipc;
mod lock;
pub mod sound;
pub mod telemetry;

pub(crate) use lock::lock_or_recover;
