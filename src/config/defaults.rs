use crate::audio::{DEFAULT_AMPLITUDE_THRESHOLD, MAX_AMPLITUDE_SCORE};

pub const DEFAULT_CHANNEL_ROOT: &str = "voicechannel";
pub const DEFAULT_REPLAY_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_MS: u64 = 20;
pub const DEFAULT_THRESHOLD: u32 = DEFAULT_AMPLITUDE_THRESHOLD;
pub const DEFAULT_DELIVERY_CAPACITY: usize = 64;
pub const DEFAULT_MAX_TAKE_MS: u64 = 30_000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 96_000;
pub(super) const MIN_FRAME_MS: u64 = 5;
pub(super) const MAX_FRAME_MS: u64 = 200;
pub(super) const MAX_THRESHOLD: u32 = MAX_AMPLITUDE_SCORE;
pub(super) const MIN_DELIVERY_CAPACITY: usize = 8;
pub(super) const MAX_DELIVERY_CAPACITY: usize = 1024;
pub(super) const MAX_TAKE_HARD_LIMIT_MS: u64 = 600_000;
pub(super) const MIN_READ_TIMEOUT_MS: u64 = 10;
pub(super) const MAX_READ_TIMEOUT_MS: u64 = 2_000;
pub(super) const MAX_DEVICE_NAME_LEN: usize = 256;
