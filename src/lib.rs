//! Delay-and-sum beamforming for array microphones.
//!
//! Describe the array with an [`ArrayMicrophoneGeometry`], the directions you
//! care about with an [`AttentionPattern`], then stream interleaved
//! multichannel audio through a [`BeamFormer`] to get mono audio focused on
//! a point in front of the array.
//!
//! ```no_run
//! use std::sync::Arc;
//! use beamfocus::*;
//!
//! let geometry = Arc::new(ArrayMicrophoneGeometry::ps3_eye());
//! let pattern = Arc::new(AttentionPattern::new(vec![Vector3::new(0.0, 1000.0, 0.0)]));
//! let (controls, mut engine) =
//!     init_beamformer(BeamFormerConfig::new(16000, 4), geometry, pattern).unwrap();
//!
//! controls.set_focus_position_meters(Vector3::new(0.5, 1.0, 0.0)).unwrap();
//!
//! let mut mic = SineSource::new(4, 440.0, 0.5, 16000);
//! let mut out = vec![0.0; 512];
//! engine.read(&mut mic, &mut out, 512, &CancellationToken::new()).unwrap();
//! ```

#[macro_use]
extern crate lazy_static;

pub mod array;
pub mod beamformer;
pub mod building_blocks;
pub mod error;
pub mod helpers;

pub use crate::array::{ArrayMicrophoneGeometry, AttentionPattern, MicPair, Projector};
pub use crate::beamformer::{
    init_beamformer, BeamFormer, BeamFormerConfig, BeamFormerControls, BeamformedSource,
    ContributingFactor, ExcitationConfig, ExcitationEstimator, SummationMode,
};
pub use crate::building_blocks::sources::{SineSource, VecSink, VecSource, WhiteNoiseSource};
pub use crate::building_blocks::{CancellationToken, SampleSink, SampleSource, StreamRead, Vector3};
pub use crate::error::{BeamformError, Result};
