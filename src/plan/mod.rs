pub mod encode;
pub mod timing;

pub use encode::{AudioCodec, EncodePlan, DEFAULT_LOSSY_BITRATE_KBPS, DEFAULT_WAV_SAMPLE_RATE_HZ};
pub use timing::TrimFadePlan;
