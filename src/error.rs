//! error types for beamformer setup and streaming

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BeamformError>;

#[derive(Error, Debug)]
pub enum BeamformError {
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Microphone geometry has {elements} elements but the input has {channels} channels")]
    ChannelMismatch { channels: usize, elements: usize },

    #[error("Array microphone geometry must have at least 1 element")]
    EmptyGeometry,

    #[error("Invalid microphone pairing {a}-{b} for a geometry of {elements} elements")]
    InvalidPairing { a: usize, b: usize, elements: usize },

    #[error("Microphones {a} and {b} are at the same position")]
    DegenerateMicPair { a: usize, b: usize },

    #[error("Angle resolution must be in (0, 90] degrees, got {0}")]
    InvalidAngleResolution(f32),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Zero vector given for {0}")]
    ZeroVector(&'static str),

    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Audio stream error: {0}")]
    Stream(String),
}

impl BeamformError {
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn out_of_range<S: Into<String>>(msg: S) -> Self {
        Self::OutOfRange(msg.into())
    }

    pub fn invalid_buffer<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBuffer(msg.into())
    }

    pub fn stream<S: Into<String>>(msg: S) -> Self {
        Self::Stream(msg.into())
    }
}
