// crossbeam for the control queue
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::Sender;

use std::sync::Arc;

use crate::beamformer::{clamp_focus_position, ControlMessage};
use crate::building_blocks::Vector3;
use crate::error::{BeamformError, Result};

/// These are the controls, the part you use in your control thread
/// to steer a running beamformer.
pub struct BeamFormerControls {
    control_q_send: Sender<ControlMessage>,
    focus: Arc<AtomicCell<Vector3>>, // shared with the engine
    pub sample_rate: u32,
}

impl BeamFormerControls {
    pub(crate) fn new(
        sample_rate: u32,
        focus: &Arc<AtomicCell<Vector3>>,
        tx: Sender<ControlMessage>,
    ) -> BeamFormerControls {
        BeamFormerControls {
            control_q_send: tx,
            focus: Arc::clone(focus),
            sample_rate,
        }
    }

    /// Request a new focus point, in meters relative to the array center.
    /// Clamped to 5 meters. Takes effect at the start of the next slice.
    pub fn set_focus_position_meters(&self, position: Vector3) -> Result<()> {
        let clamped = clamp_focus_position(position);
        self.control_q_send
            .try_send(ControlMessage::SetFocus(clamped))
            .map_err(|e| BeamformError::stream(format!("control queue: {}", e)))?;
        self.focus.store(clamped);
        Ok(())
    }

    /// the most recently requested focus point (or the one the engine
    /// was set to directly, whichever happened last)
    pub fn focus_position_meters(&self) -> Vector3 {
        self.focus.load()
    }
}
