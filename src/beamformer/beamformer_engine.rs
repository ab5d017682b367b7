// crossbeam for the control queue
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::Receiver;

use std::f32::consts::PI;
use std::sync::Arc;

use crate::array::{ArrayMicrophoneGeometry, AttentionPattern, MicPair};
use crate::beamformer::{
    clamp_focus_position, BeamFormerConfig, ControlMessage, ExcitationEstimator, SummationMode,
    MIN_DISCRIMINATION_ANGLE_DEGREES, MIN_DISCRIMINATION_VECTORS, PROCESSING_SLICE_MS,
};
use crate::building_blocks::correlation::lagged_correlation;
use crate::building_blocks::pool::BufferPool;
use crate::building_blocks::{CancellationToken, SampleSink, SampleSource, StreamRead, Vector3};
use crate::error::{BeamformError, Result};
use crate::helpers::interleave::deinterleave_into;
use crate::helpers::units::{samples_for_duration, speed_of_sound_mm_per_sample};

/// width of the chunked accumulator in the vectorized summation path
const SUMMATION_LANES: usize = 8;

/**
 * Maps one attention point onto one mic pair: the angle of the point as
 * seen from the pair, and the two table delays bracketing that angle.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct ContributingFactor {
    pub attention_point_index: usize,
    pub pair_index: usize,
    pub channel_a: usize,
    pub channel_b: usize,
    /// angle between the pair's primary axis and the attention point, in radians
    pub angle: f32,
    pub delay_one: i32,
    pub delay_two: i32,
    pub blend_towards_two: f32,
}

/**
 * The streaming delay-and-sum engine. Takes interleaved audio from an
 * array microphone, one full processing slice at a time, and produces
 * mono audio focused on the current focus point.
 *
 * Each channel's input buffer holds one work area (the samples turned
 * into output this slice) followed by an overlap area, which is as long
 * as the largest possible delay between two elements. After a slice is
 * generated, the overlap area moves to the front.
 */
pub struct BeamFormer {
    config: BeamFormerConfig,
    geometry: Arc<ArrayMicrophoneGeometry>,
    attention_pattern: Arc<AttentionPattern>,
    mic_pairs: Vec<MicPair>,
    contributing_factors: Vec<ContributingFactor>,
    excitation: Option<ExcitationEstimator>,
    work_area_samples: usize,
    overlap_samples: usize,
    input_buffers: Vec<Vec<f32>>,
    valid_input_samples: usize,
    output_buffer: Vec<f32>,
    valid_output_samples: usize,
    focus_position_meters: Vector3,
    steering_offsets: Vec<usize>,
    correlations: Vec<Vec<f32>>,
    control_q_rec: Option<Receiver<ControlMessage>>,
    focus_mirror: Option<Arc<AtomicCell<Vector3>>>,
    pool: Arc<BufferPool>,
}

impl BeamFormer {
    /// A standalone engine, steered directly through `set_focus_position_meters`.
    pub fn new(
        config: BeamFormerConfig,
        geometry: Arc<ArrayMicrophoneGeometry>,
        attention_pattern: Arc<AttentionPattern>,
    ) -> Result<Self> {
        Self::build(config, geometry, attention_pattern, None, None)
    }

    pub(crate) fn with_control_queue(
        config: BeamFormerConfig,
        geometry: Arc<ArrayMicrophoneGeometry>,
        attention_pattern: Arc<AttentionPattern>,
        rx: Receiver<ControlMessage>,
        focus: &Arc<AtomicCell<Vector3>>,
    ) -> Result<Self> {
        Self::build(
            config,
            geometry,
            attention_pattern,
            Some(rx),
            Some(Arc::clone(focus)),
        )
    }

    fn build(
        config: BeamFormerConfig,
        geometry: Arc<ArrayMicrophoneGeometry>,
        attention_pattern: Arc<AttentionPattern>,
        control_q_rec: Option<Receiver<ControlMessage>>,
        focus_mirror: Option<Arc<AtomicCell<Vector3>>>,
    ) -> Result<Self> {
        let sample_rate = config.sample_rate;
        if sample_rate == 0 {
            return Err(BeamformError::InvalidSampleRate(sample_rate));
        }
        if geometry.num_elements() == 0 {
            return Err(BeamformError::EmptyGeometry);
        }
        if config.num_channels != geometry.num_elements() {
            return Err(BeamformError::ChannelMismatch {
                channels: config.num_channels,
                elements: geometry.num_elements(),
            });
        }
        config.excitation.validate()?;

        let work_area_samples = samples_for_duration(sample_rate, PROCESSING_SLICE_MS);
        if work_area_samples == 0 {
            // below 50Hz a slice has no samples at all
            return Err(BeamformError::InvalidSampleRate(sample_rate));
        }

        let mm_per_sample = speed_of_sound_mm_per_sample(sample_rate);
        let largest_possible_offset =
            (geometry.max_element_separation() / mm_per_sample).ceil() as usize;
        let overlap_samples = largest_possible_offset + 1;
        let input_len = work_area_samples + overlap_samples;

        let mut mic_pairs = Vec::new();
        for (a, b) in geometry.effective_pairings() {
            let pair = MicPair::new(
                a,
                b,
                geometry.positions()[a],
                geometry.positions()[b],
                sample_rate,
                MIN_DISCRIMINATION_ANGLE_DEGREES,
            )?;
            if pair.vector_angle_offsets().len() < MIN_DISCRIMINATION_VECTORS {
                log::warn!(
                    "Microphone pair {}-{} has only {} vectors of discrimination, which will probably give inaccurate results. Increase the input sample rate to get better beamforming results.",
                    a,
                    b,
                    pair.vector_angle_offsets().len()
                );
            }
            mic_pairs.push(pair);
        }

        let contributing_factors = compute_contributing_factors(&mic_pairs, &attention_pattern)?;

        log::debug!(
            "beamformer: {} channels at {}Hz, work area {} + overlap {} samples, {} mic pairs, {} contributing factors",
            config.num_channels,
            sample_rate,
            work_area_samples,
            overlap_samples,
            mic_pairs.len(),
            contributing_factors.len()
        );

        let excitation = if config.excitation.enabled {
            Some(ExcitationEstimator::new(
                &config.excitation,
                attention_pattern.num_elements(),
            ))
        } else {
            None
        };

        let correlations = mic_pairs
            .iter()
            .map(|p| vec![0.0; p.vector_angle_offsets().len()])
            .collect();

        let num_channels = config.num_channels;
        let mut beamformer = BeamFormer {
            config,
            geometry,
            attention_pattern,
            mic_pairs,
            contributing_factors,
            excitation,
            work_area_samples,
            overlap_samples,
            input_buffers: vec![vec![0.0; input_len]; num_channels],
            valid_input_samples: 0,
            output_buffer: vec![0.0; work_area_samples],
            valid_output_samples: 0,
            focus_position_meters: Vector3::ZERO,
            steering_offsets: vec![0; num_channels],
            correlations,
            control_q_rec,
            focus_mirror,
            pool: BufferPool::shared(),
        };
        beamformer.recalculate_steering_offsets();

        Ok(beamformer)
    }

    pub fn config(&self) -> &BeamFormerConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.config.num_channels
    }

    pub fn geometry(&self) -> &Arc<ArrayMicrophoneGeometry> {
        &self.geometry
    }

    pub fn attention_pattern(&self) -> &Arc<AttentionPattern> {
        &self.attention_pattern
    }

    pub fn mic_pairs(&self) -> &[MicPair] {
        &self.mic_pairs
    }

    pub fn contributing_factors(&self) -> &[ContributingFactor] {
        &self.contributing_factors
    }

    /// samples per channel turned into output per slice
    pub fn work_area_samples(&self) -> usize {
        self.work_area_samples
    }

    pub fn overlap_samples(&self) -> usize {
        self.overlap_samples
    }

    /// frames per channel accumulated towards the next slice
    pub fn buffered_input_frames(&self) -> usize {
        self.valid_input_samples
    }

    pub fn steering_offsets(&self) -> &[usize] {
        &self.steering_offsets
    }

    /// correlations of the last processed slice, `[pair][table entry]`
    pub fn last_correlations(&self) -> &[Vec<f32>] {
        &self.correlations
    }

    /// per attention point, None unless excitation is enabled
    pub fn excitation(&self) -> Option<&[f32]> {
        self.excitation.as_ref().map(|e| e.excitation())
    }

    pub fn strongest_attention_point(&self) -> Option<usize> {
        self.excitation
            .as_ref()
            .and_then(|e| e.strongest_attention_point())
    }

    pub fn focus_position_meters(&self) -> Vector3 {
        self.focus_position_meters
    }

    /// Point the beam at `position` (meters, relative to the array center).
    /// Clamped to 5 meters. Applies from the next generated slice on.
    pub fn set_focus_position_meters(&mut self, position: Vector3) {
        self.focus_position_meters = clamp_focus_position(position);
        if let Some(mirror) = &self.focus_mirror {
            mirror.store(self.focus_position_meters);
        }
        self.recalculate_steering_offsets();
    }

    fn recalculate_steering_offsets(&mut self) {
        self.geometry.propagation_delays(
            self.focus_position_meters * 1000.0,
            self.config.sample_rate,
            &mut self.steering_offsets,
        );
    }

    pub(crate) fn apply_control_messages(&mut self) {
        let mut latest_focus = None;
        if let Some(rx) = &self.control_q_rec {
            for cm in rx.try_iter() {
                match cm {
                    ControlMessage::SetFocus(pos) => latest_focus = Some(pos),
                }
            }
        }
        if let Some(pos) = latest_focus {
            self.set_focus_position_meters(pos);
        }
    }

    fn input_buffer_len(&self) -> usize {
        self.work_area_samples + self.overlap_samples
    }

    /// copies pending output to the front of `dest`, compacting whatever doesn't fit
    fn drain_output(&mut self, dest: &mut [f32]) -> usize {
        let n = dest.len().min(self.valid_output_samples);
        if n == 0 {
            return 0;
        }
        dest[..n].copy_from_slice(&self.output_buffer[..n]);
        self.output_buffer.copy_within(n..self.valid_output_samples, 0);
        self.valid_output_samples -= n;
        n
    }

    /// Pull mode: fill `buffer` with up to `samples_per_channel` mono samples,
    /// reading from `input` as needed.
    ///
    /// Returns fewer samples than asked for if the input ran dry, and
    /// `EndOfStream` only if the input ended before anything was produced.
    /// A cancellation after some output was produced returns that output,
    /// the following call fails with `Cancelled`.
    pub fn read<S: SampleSource + ?Sized>(
        &mut self,
        input: &mut S,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead> {
        if cancel.is_cancelled() {
            return Err(BeamformError::Cancelled);
        }
        let channels = self.config.num_channels;
        if input.channels() != channels {
            return Err(BeamformError::ChannelMismatch {
                channels: input.channels(),
                elements: channels,
            });
        }
        if buffer.len() < samples_per_channel {
            return Err(BeamformError::invalid_buffer(format!(
                "asked for {} samples, buffer holds {}",
                samples_per_channel,
                buffer.len()
            )));
        }

        // leftovers first, this either satisfies the whole read
        // or empties the output buffer
        let mut returned = self.drain_output(&mut buffer[..samples_per_channel]);
        if returned == samples_per_channel {
            return Ok(StreamRead::Samples(returned));
        }

        let input_len = self.input_buffer_len();
        let mut scratch = self.pool.rent(input_len * channels);

        while returned < samples_per_channel {
            // output already handed over must reach the caller,
            // the next call reports the cancellation
            if cancel.is_cancelled() {
                return partial_or(returned, BeamformError::Cancelled);
            }

            let to_read = (scratch.len() / channels)
                .min(samples_per_channel - returned)
                .min(input_len - self.valid_input_samples);

            let upstream = match input.read(&mut scratch[..to_read * channels], to_read, cancel) {
                Err(BeamformError::Cancelled) => {
                    return partial_or(returned, BeamformError::Cancelled);
                }
                other => other?,
            };
            let frames = match upstream {
                StreamRead::EndOfStream => {
                    return Ok(if returned == 0 {
                        StreamRead::EndOfStream
                    } else {
                        StreamRead::Samples(returned)
                    });
                }
                StreamRead::Samples(0) => return Ok(StreamRead::Samples(returned)),
                StreamRead::Samples(frames) if frames > to_read => {
                    return Err(BeamformError::stream(format!(
                        "upstream returned {} frames, {} were requested",
                        frames, to_read
                    )));
                }
                StreamRead::Samples(frames) => frames,
            };

            deinterleave_into(
                &scratch[..frames * channels],
                frames,
                &mut self.input_buffers,
                self.valid_input_samples,
            );
            self.valid_input_samples += frames;

            if self.valid_input_samples == input_len {
                self.process_input_buffer();
                self.generate_output();
                returned += self.drain_output(&mut buffer[returned..samples_per_channel]);
            }
        }

        Ok(StreamRead::Samples(returned))
    }

    /// Push mode: consume `samples_per_channel` interleaved frames from
    /// `buffer`, writing every completed slice to `output` right away.
    ///
    /// If `output` fails, the frames up to the end of the slice that failed
    /// to go out are consumed, the rest of `buffer` is not. That slice is
    /// flushed first on the next call. Only resend the frames after the
    /// slice boundary, which comes `work_area_samples() + overlap_samples()
    /// - buffered_input_frames()` frames into `buffer`, as measured before
    /// the call.
    pub fn write<W: SampleSink + ?Sized>(
        &mut self,
        output: &mut W,
        buffer: &[f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(BeamformError::Cancelled);
        }
        let channels = self.config.num_channels;
        if buffer.len() < samples_per_channel * channels {
            return Err(BeamformError::invalid_buffer(format!(
                "{} frames of {} channels need {} samples, buffer holds {}",
                samples_per_channel,
                channels,
                samples_per_channel * channels,
                buffer.len()
            )));
        }

        // anything left over from a previous read or a failed write goes first
        if self.valid_output_samples > 0 {
            output.write(
                &self.output_buffer[..self.valid_output_samples],
                self.valid_output_samples,
                cancel,
            )?;
            self.valid_output_samples = 0;
        }

        let input_len = self.input_buffer_len();
        let mut consumed = 0;
        while consumed < samples_per_channel {
            let frames = (samples_per_channel - consumed).min(input_len - self.valid_input_samples);
            deinterleave_into(
                &buffer[consumed * channels..(consumed + frames) * channels],
                frames,
                &mut self.input_buffers,
                self.valid_input_samples,
            );
            self.valid_input_samples += frames;
            consumed += frames;

            if self.valid_input_samples == input_len {
                self.process_input_buffer();
                self.generate_output();
                debug_assert_eq!(self.valid_output_samples, self.work_area_samples);
                output.write(
                    &self.output_buffer[..self.valid_output_samples],
                    self.valid_output_samples,
                    cancel,
                )?;
                self.valid_output_samples = 0;
            }
        }

        Ok(())
    }

    /// Correlates every mic pair at every delay in its table.
    /// Assumes a full input buffer, doesn't touch the output buffer.
    fn process_input_buffer(&mut self) {
        let len = self.work_area_samples;

        for (pair, correlations) in self.mic_pairs.iter().zip(self.correlations.iter_mut()) {
            let a = &self.input_buffers[pair.a_index()];
            let b = &self.input_buffers[pair.b_index()];
            for (corr, &(_, offset)) in correlations
                .iter_mut()
                .zip(pair.vector_angle_offsets().iter())
            {
                *corr = lagged_correlation(a, b, offset, len);
            }
        }

        if let Some(excitation) = self.excitation.as_mut() {
            excitation.update(&self.mic_pairs, &self.contributing_factors, &self.correlations);
            log::trace!(
                "slice processed, strongest attention point: {:?}",
                excitation.strongest_attention_point()
            );
        }
    }

    /// Sums the steered channels of a full input buffer into one slice
    /// of output, then carries the overlap area over to the next slice.
    fn generate_output(&mut self) {
        // focus changes only ever apply between slices
        self.apply_control_messages();

        match self.config.summation {
            SummationMode::Auto | SummationMode::Vectorized => self.sum_vectorized(),
            SummationMode::Scalar => self.sum_scalar(),
        }

        let work = self.work_area_samples;
        let overlap = self.overlap_samples;
        for buf in self.input_buffers.iter_mut() {
            buf.copy_within(work..work + overlap, 0);
        }
        self.valid_input_samples -= work;
        self.valid_output_samples = work;
    }

    fn sum_vectorized(&mut self) {
        let work = self.work_area_samples;
        let scale = 1.0 / self.input_buffers.len() as f32;
        let full_chunks_end = work - work % SUMMATION_LANES;
        let out = &mut self.output_buffer[..work];

        for base in (0..full_chunks_end).step_by(SUMMATION_LANES) {
            let mut acc = [0.0_f32; SUMMATION_LANES];
            for (buf, &offset) in self.input_buffers.iter().zip(self.steering_offsets.iter()) {
                let start = base + offset;
                for (a, s) in acc.iter_mut().zip(buf[start..start + SUMMATION_LANES].iter()) {
                    *a += *s;
                }
            }
            for (o, a) in out[base..base + SUMMATION_LANES].iter_mut().zip(acc.iter()) {
                *o = *a * scale;
            }
        }

        // the remainder
        for (i, o) in out.iter_mut().enumerate().skip(full_chunks_end) {
            let mut acc = 0.0;
            for (buf, &offset) in self.input_buffers.iter().zip(self.steering_offsets.iter()) {
                acc += buf[i + offset];
            }
            *o = acc * scale;
        }
    }

    fn sum_scalar(&mut self) {
        let work = self.work_area_samples;
        let scale = 1.0 / self.input_buffers.len() as f32;
        let out = &mut self.output_buffer[..work];

        let first_offset = self.steering_offsets[0];
        out.copy_from_slice(&self.input_buffers[0][first_offset..first_offset + work]);

        for (buf, &offset) in self
            .input_buffers
            .iter()
            .zip(self.steering_offsets.iter())
            .skip(1)
        {
            for (o, s) in out.iter_mut().zip(buf[offset..offset + work].iter()) {
                *o += *s;
            }
        }

        out.iter_mut().for_each(|o| *o *= scale);
    }
}

fn partial_or(returned: usize, err: BeamformError) -> Result<StreamRead> {
    if returned > 0 {
        Ok(StreamRead::Samples(returned))
    } else {
        Err(err)
    }
}

/// For every mic pair and attention point, find the table entries
/// bracketing the point's angle and how far between them it sits.
fn compute_contributing_factors(
    mic_pairs: &[MicPair],
    attention_pattern: &AttentionPattern,
) -> Result<Vec<ContributingFactor>> {
    let mut factors = Vec::with_capacity(mic_pairs.len() * attention_pattern.num_elements());

    for (pair_index, pair) in mic_pairs.iter().enumerate() {
        let table = pair.vector_angle_offsets();
        for (attention_idx, point) in attention_pattern.positions().iter().enumerate() {
            let angle = pair
                .primary_axis()
                .angle_between(*point - pair.centroid(), "attention point relative to mic pair")?;

            let mut highest_angle_below = 0.0;
            let mut highest_below_offset = table[table.len() - 1].1;
            let mut lowest_angle_above = PI;
            let mut lowest_above_offset = table[0].1;
            for &(entry_angle, offset) in table {
                if entry_angle <= angle && entry_angle > highest_angle_below {
                    highest_angle_below = entry_angle;
                    highest_below_offset = offset;
                }
                if entry_angle >= angle && entry_angle < lowest_angle_above {
                    lowest_angle_above = entry_angle;
                    lowest_above_offset = offset;
                }
            }

            // an exact table hit brackets itself
            let span = lowest_angle_above - highest_angle_below;
            let blend = if span > 0.0 {
                (angle - highest_angle_below) / span
            } else {
                0.0
            };

            log::debug!(
                "attention point {} has a delay between {} and {} on pair {}-{}",
                point,
                highest_below_offset,
                lowest_above_offset,
                pair.a_index(),
                pair.b_index()
            );

            factors.push(ContributingFactor {
                attention_point_index: attention_idx,
                pair_index,
                channel_a: pair.a_index(),
                channel_b: pair.b_index(),
                angle,
                delay_one: lowest_above_offset,
                delay_two: highest_below_offset,
                blend_towards_two: blend,
            });
        }
    }

    Ok(factors)
}

/**
 * A beamformer bundled with its upstream, usable as a mono source
 * anywhere a `SampleSource` is expected.
 */
pub struct BeamformedSource<S: SampleSource> {
    engine: BeamFormer,
    input: S,
}

impl<S: SampleSource> BeamformedSource<S> {
    pub fn new(engine: BeamFormer, input: S) -> Result<Self> {
        if input.channels() != engine.num_channels() {
            return Err(BeamformError::ChannelMismatch {
                channels: input.channels(),
                elements: engine.num_channels(),
            });
        }
        Ok(BeamformedSource { engine, input })
    }

    pub fn engine(&self) -> &BeamFormer {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut BeamFormer {
        &mut self.engine
    }

    pub fn into_parts(self) -> (BeamFormer, S) {
        (self.engine, self.input)
    }
}

impl<S: SampleSource> SampleSource for BeamformedSource<S> {
    fn channels(&self) -> usize {
        1
    }

    fn read(
        &mut self,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead> {
        self.engine
            .read(&mut self.input, buffer, samples_per_channel, cancel)
    }
}
