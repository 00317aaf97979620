//! Error types for CueSonic

use crate::spatial::NativeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CueSonicError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Spatial audio error: {0}")]
    SpatialAudio(String),

    #[error("Native DSP error: {0}")]
    Native(#[from] NativeError),

    #[error("Cue channel {0} is closed")]
    ChannelClosed(u64),
}

pub type Result<T> = std::result::Result<T, CueSonicError>;
