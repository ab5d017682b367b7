pub mod beamformer_controls;
pub mod beamformer_engine;
pub mod excitation;

// crossbeam for the control queue
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{Receiver, Sender};

use std::sync::Arc;

use crate::array::{ArrayMicrophoneGeometry, AttentionPattern};
use crate::building_blocks::Vector3;
use crate::error::{BeamformError, Result};

pub use crate::beamformer::{beamformer_controls::*, beamformer_engine::*, excitation::*};

/// Length of one processing slice. The overlap math assumes this never
/// changes during the lifetime of an engine.
pub const PROCESSING_SLICE_MS: u64 = 20;

/// focus and source positions are clamped to this distance from the array
pub const MAX_FOCUS_DISTANCE_METERS: f32 = 5.0;

/// angle resolution used for every mic pair's delay table
pub const MIN_DISCRIMINATION_ANGLE_DEGREES: f32 = 1.0;

/// pairs with fewer delay table entries than this get a warning
pub const MIN_DISCRIMINATION_VECTORS: usize = 5;

const CONTROL_QUEUE_SIZE: usize = 256;

/// Which summation loop generates the output slice.
/// Both produce the same result, the explicit variants exist so
/// tests can exercise each path deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SummationMode {
    #[default]
    Auto,
    /// fixed-width chunked accumulation, friendly to auto-vectorization
    Vectorized,
    Scalar,
}

/// Parameters of the (optional) excitation estimate.
#[derive(Clone, Debug, PartialEq)]
pub struct ExcitationConfig {
    pub enabled: bool,
    /// full weight for angle differences below this
    pub window_min_degrees: f32,
    /// no weight for angle differences above this
    pub window_max_degrees: f32,
    /// weight of the current slice, in (0, 1]. 1 only looks at the
    /// current slice, smaller values keep more history
    pub decay_rate: f32,
}

impl Default for ExcitationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_min_degrees: 10.0,
            window_max_degrees: 30.0,
            decay_rate: 1.0,
        }
    }
}

impl ExcitationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.window_min_degrees >= 0.0 && self.window_min_degrees < self.window_max_degrees) {
            return Err(BeamformError::invalid_config(format!(
                "excitation window must satisfy 0 <= min < max, got {} / {}",
                self.window_min_degrees, self.window_max_degrees
            )));
        }
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err(BeamformError::invalid_config(format!(
                "excitation decay rate must be in (0, 1], got {}",
                self.decay_rate
            )));
        }
        Ok(())
    }
}

/// Construction-time configuration of a beamformer.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamFormerConfig {
    pub sample_rate: u32,
    /// interleaved input channels, must match the geometry's element count
    pub num_channels: usize,
    pub summation: SummationMode,
    pub excitation: ExcitationConfig,
}

impl Default for BeamFormerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            num_channels: 4,
            summation: SummationMode::Auto,
            excitation: ExcitationConfig::default(),
        }
    }
}

impl BeamFormerConfig {
    pub fn new(sample_rate: u32, num_channels: usize) -> Self {
        Self {
            sample_rate,
            num_channels,
            ..Default::default()
        }
    }

    pub fn with_summation(mut self, summation: SummationMode) -> Self {
        self.summation = summation;
        self
    }

    pub fn with_excitation(mut self, excitation: ExcitationConfig) -> Self {
        self.excitation = excitation;
        self
    }
}

pub(crate) enum ControlMessage {
    SetFocus(Vector3),
}

/// rescales anything farther out than the maximum focus distance
pub fn clamp_focus_position(position_meters: Vector3) -> Vector3 {
    if position_meters.magnitude() > MAX_FOCUS_DISTANCE_METERS {
        // that long, it can't be a zero vector
        position_meters
            .of_length(MAX_FOCUS_DISTANCE_METERS, "focus position")
            .unwrap_or(position_meters)
    } else {
        position_meters
    }
}

/// Creates a beamformer split in two halves: the controls, to be used
/// from a control thread, and the engine, which lives on the audio thread.
/// Focus changes sent through the controls apply at the next slice.
pub fn init_beamformer(
    config: BeamFormerConfig,
    geometry: Arc<ArrayMicrophoneGeometry>,
    pattern: Arc<AttentionPattern>,
) -> Result<(BeamFormerControls, BeamFormer)> {
    let (tx, rx): (Sender<ControlMessage>, Receiver<ControlMessage>) =
        crossbeam::channel::bounded(CONTROL_QUEUE_SIZE);

    let focus = Arc::new(AtomicCell::<Vector3>::new(Vector3::ZERO));

    let engine = BeamFormer::with_control_queue(config, geometry, pattern, rx, &focus)?;
    let controls = BeamFormerControls::new(engine.sample_rate(), &focus, tx);

    Ok((controls, engine))
}
