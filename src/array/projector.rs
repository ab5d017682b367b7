use std::sync::Arc;

use crate::array::geometry::ArrayMicrophoneGeometry;
use crate::beamformer::clamp_focus_position;
use crate::building_blocks::pool::BufferPool;
use crate::building_blocks::{CancellationToken, SampleSource, StreamRead, Vector3};
use crate::error::{BeamformError, Result};
use crate::helpers::interleave::interleave_into;
use crate::helpers::units::speed_of_sound_mm_per_sample;

/**
 * Places a mono signal at a point in space in front of an array
 * microphone and renders what each element would hear: the same
 * signal, delayed by the travel time difference to each element.
 * No attenuation, no room.
 */
pub struct Projector<S: SampleSource> {
    input: S,
    geometry: Arc<ArrayMicrophoneGeometry>,
    sample_rate: u32,
    source_position_meters: Vector3,
    delays: Vec<usize>,
    // the last `history_len` input samples, followed by the current block
    line: Vec<f32>,
    history_len: usize,
    pool: Arc<BufferPool>,
}

impl<S: SampleSource> Projector<S> {
    pub fn new(input: S, geometry: Arc<ArrayMicrophoneGeometry>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(BeamformError::InvalidSampleRate(sample_rate));
        }
        if input.channels() != 1 {
            return Err(BeamformError::invalid_config(format!(
                "projector input must be mono, got {} channels",
                input.channels()
            )));
        }

        let history_len = (geometry.max_element_separation()
            / speed_of_sound_mm_per_sample(sample_rate))
        .ceil() as usize
            + 1;

        let mut proj = Projector {
            input,
            delays: vec![0; geometry.num_elements()],
            geometry,
            sample_rate,
            source_position_meters: Vector3::ZERO,
            line: vec![0.0; history_len],
            history_len,
            pool: BufferPool::shared(),
        };
        proj.recalculate_delays();
        Ok(proj)
    }

    pub fn source_position_meters(&self) -> Vector3 {
        self.source_position_meters
    }

    /// clamped to 5 meters from the array center
    pub fn set_source_position_meters(&mut self, position: Vector3) {
        self.source_position_meters = clamp_focus_position(position);
        self.recalculate_delays();
    }

    pub fn delays(&self) -> &[usize] {
        &self.delays
    }

    pub fn into_inner(self) -> S {
        self.input
    }

    fn recalculate_delays(&mut self) {
        self.geometry.propagation_delays(
            self.source_position_meters * 1000.0,
            self.sample_rate,
            &mut self.delays,
        );
    }
}

impl<S: SampleSource> SampleSource for Projector<S> {
    fn channels(&self) -> usize {
        self.geometry.num_elements()
    }

    fn read(
        &mut self,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead> {
        let channels = self.channels();
        if buffer.len() < samples_per_channel * channels {
            return Err(BeamformError::invalid_buffer(format!(
                "projector needs {} samples, buffer holds {}",
                samples_per_channel * channels,
                buffer.len()
            )));
        }

        let mut scratch = self.pool.rent(samples_per_channel);
        let frames = match self.input.read(&mut scratch, samples_per_channel, cancel)? {
            StreamRead::EndOfStream => return Ok(StreamRead::EndOfStream),
            StreamRead::Samples(frames) => frames,
        };
        if frames == 0 {
            return Ok(StreamRead::Samples(0));
        }

        self.line.extend_from_slice(&scratch[..frames]);

        let per_channel: Vec<&[f32]> = self
            .delays
            .iter()
            .map(|&delay| {
                let start = self.history_len - delay;
                &self.line[start..start + frames]
            })
            .collect();
        interleave_into(&per_channel, &mut buffer[..frames * channels]);

        // keep the tail around for the next block
        self.line.drain(..frames);

        Ok(StreamRead::Samples(frames))
    }
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;
    use crate::building_blocks::sources::VecSource;

    fn bar() -> Arc<ArrayMicrophoneGeometry> {
        Arc::new(
            ArrayMicrophoneGeometry::new(&[
                Vector3::new(-75.0, 0.0, 0.0),
                Vector3::new(-25.0, 0.0, 0.0),
                Vector3::new(25.0, 0.0, 0.0),
                Vector3::new(75.0, 0.0, 0.0),
            ])
            .unwrap(),
        )
    }

    fn impulse(len: usize) -> VecSource {
        let mut sig = vec![0.0; len];
        sig[0] = 1.0;
        VecSource::new(sig, 1)
    }

    #[test]
    fn test_bar_side_delays() {
        let mut proj = Projector::new(impulse(64), bar(), 48000).unwrap();
        proj.set_source_position_meters(Vector3::new(1.5, 0.0, 0.0));
        // the element closest to the source hears it first
        assert_eq!(proj.delays(), &[21, 14, 7, 0]);
    }

    #[test]
    fn test_bar_center_delays() {
        let proj = Projector::new(impulse(64), bar(), 48000).unwrap();
        assert_eq!(proj.delays(), &[7, 0, 0, 7]);
    }

    #[test]
    fn test_ring_center_has_no_delays() {
        let ring = Arc::new(
            ArrayMicrophoneGeometry::new(&[
                Vector3::new(-50.0, -50.0, 0.0),
                Vector3::new(-50.0, 50.0, 0.0),
                Vector3::new(50.0, -50.0, 0.0),
                Vector3::new(50.0, 50.0, 0.0),
            ])
            .unwrap(),
        );
        let proj = Projector::new(impulse(64), ring, 48000).unwrap();
        assert_eq!(proj.delays(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_impulse_lands_at_delay_across_reads() {
        let mut proj = Projector::new(impulse(64).with_max_chunk(5), bar(), 48000).unwrap();
        proj.set_source_position_meters(Vector3::new(1.5, 0.0, 0.0));
        let cancel = CancellationToken::new();

        let mut rendered = Vec::new();
        let mut buf = vec![0.0; 64 * 4];
        while let StreamRead::Samples(frames) = proj.read(&mut buf, 16, &cancel).unwrap() {
            rendered.extend_from_slice(&buf[..frames * 4]);
        }
        assert_eq!(rendered.len(), 64 * 4);

        for (chan, delay) in [21, 14, 7, 0].iter().enumerate() {
            for frame in 0..64 {
                let expected = if frame == *delay { 1.0 } else { 0.0 };
                assert_eq!(rendered[frame * 4 + chan], expected);
            }
        }
    }

    #[test]
    fn test_source_position_is_clamped() {
        let mut proj = Projector::new(impulse(8), bar(), 48000).unwrap();
        proj.set_source_position_meters(Vector3::new(0.0, 8.0, 6.0));
        let pos = proj.source_position_meters();
        assert_approx_eq::assert_approx_eq!(pos.magnitude(), 5.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(pos.y, 4.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(pos.z, 3.0, 0.0001);
    }

    #[test]
    fn test_rejects_multichannel_input() {
        let src = VecSource::new(vec![0.0; 8], 2);
        assert!(Projector::new(src, bar(), 48000).is_err());
        assert!(Projector::new(impulse(8), bar(), 0).is_err());
    }
}
