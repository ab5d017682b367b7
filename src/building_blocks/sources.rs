use std::f32::consts::PI;

use crate::building_blocks::{CancellationToken, SampleSink, SampleSource, StreamRead};
use crate::error::{BeamformError, Result};

fn check_capacity(buffer_len: usize, samples_per_channel: usize, channels: usize) -> Result<()> {
    if buffer_len < samples_per_channel * channels {
        return Err(BeamformError::invalid_buffer(format!(
            "buffer holds {} samples, need {} for {} frames of {} channels",
            buffer_len,
            samples_per_channel * channels,
            samples_per_channel,
            channels
        )));
    }
    Ok(())
}

/**
 * sine generator, same signal on every channel
 */
pub struct SineSource {
    channels: usize,
    freq: f32,
    amp: f32,
    samplerate: f32,
    position: usize,
    length: Option<usize>,
}

impl SineSource {
    pub fn new(channels: usize, freq: f32, amp: f32, samplerate: u32) -> Self {
        SineSource {
            channels,
            freq,
            amp,
            samplerate: samplerate as f32,
            position: 0,
            length: None,
        }
    }

    /// stop after `samples_per_channel` frames
    pub fn with_length(mut self, samples_per_channel: usize) -> Self {
        self.length = Some(samples_per_channel);
        self
    }

    /// the value at frame `n`, handy for comparing against
    pub fn sample_at(&self, n: usize) -> f32 {
        (2.0 * PI * self.freq * (n as f32 / self.samplerate)).sin() * self.amp
    }
}

impl SampleSource for SineSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn read(
        &mut self,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead> {
        if cancel.is_cancelled() {
            return Err(BeamformError::Cancelled);
        }
        check_capacity(buffer.len(), samples_per_channel, self.channels)?;

        let frames = match self.length {
            Some(len) if self.position >= len => return Ok(StreamRead::EndOfStream),
            Some(len) => samples_per_channel.min(len - self.position),
            None => samples_per_channel,
        };

        for (i, frame) in buffer
            .chunks_exact_mut(self.channels)
            .take(frames)
            .enumerate()
        {
            let val = self.sample_at(self.position + i);
            frame.iter_mut().for_each(|s| *s = val);
        }

        self.position += frames;
        Ok(StreamRead::Samples(frames))
    }
}

/**
 * a seeded white noise generator based on wyrand (through fastrand),
 * same signal on every channel
 */
pub struct WhiteNoiseSource {
    channels: usize,
    amp: f32,
    rng: fastrand::Rng,
}

impl WhiteNoiseSource {
    pub fn new(channels: usize, amp: f32, seed: u64) -> Self {
        WhiteNoiseSource {
            channels,
            amp,
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl SampleSource for WhiteNoiseSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn read(
        &mut self,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead> {
        if cancel.is_cancelled() {
            return Err(BeamformError::Cancelled);
        }
        check_capacity(buffer.len(), samples_per_channel, self.channels)?;

        for frame in buffer
            .chunks_exact_mut(self.channels)
            .take(samples_per_channel)
        {
            let val = (self.rng.f32() * 2.0 - 1.0) * self.amp;
            frame.iter_mut().for_each(|s| *s = val);
        }

        Ok(StreamRead::Samples(samples_per_channel))
    }
}

/**
 * plays back a prepared interleaved buffer, optionally in limited
 * chunks to simulate a device that delivers irregular amounts
 */
pub struct VecSource {
    channels: usize,
    samples: Vec<f32>,
    position: usize,
    max_chunk: Option<usize>,
}

impl VecSource {
    pub fn new(samples: Vec<f32>, channels: usize) -> Self {
        VecSource {
            channels,
            samples,
            position: 0,
            max_chunk: None,
        }
    }

    /// never hand out more than `frames` frames per read
    pub fn with_max_chunk(mut self, frames: usize) -> Self {
        self.max_chunk = Some(frames);
        self
    }

    pub fn remaining_frames(&self) -> usize {
        (self.samples.len() - self.position) / self.channels
    }
}

impl SampleSource for VecSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn read(
        &mut self,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead> {
        if cancel.is_cancelled() {
            return Err(BeamformError::Cancelled);
        }
        check_capacity(buffer.len(), samples_per_channel, self.channels)?;

        let remaining = self.remaining_frames();
        if remaining == 0 {
            return Ok(StreamRead::EndOfStream);
        }

        let mut frames = samples_per_channel.min(remaining);
        if let Some(max) = self.max_chunk {
            frames = frames.min(max);
        }

        let len = frames * self.channels;
        buffer[..len].copy_from_slice(&self.samples[self.position..self.position + len]);
        self.position += len;

        Ok(StreamRead::Samples(frames))
    }
}

/**
 * collects everything written to it
 */
#[derive(Default)]
pub struct VecSink {
    channels: usize,
    pub samples: Vec<f32>,
}

impl VecSink {
    pub fn new(channels: usize) -> Self {
        VecSink {
            channels,
            samples: Vec::new(),
        }
    }

    /// pre-allocate, so writes up to `capacity` samples don't allocate
    pub fn with_capacity(channels: usize, capacity: usize) -> Self {
        VecSink {
            channels,
            samples: Vec::with_capacity(capacity),
        }
    }
}

impl SampleSink for VecSink {
    fn write(
        &mut self,
        buffer: &[f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(BeamformError::Cancelled);
        }
        check_capacity(buffer.len(), samples_per_channel, self.channels)?;
        self.samples
            .extend_from_slice(&buffer[..samples_per_channel * self.channels]);
        Ok(())
    }
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_source_length_and_eof() {
        let mut sine = SineSource::new(2, 1000.0, 0.5, 48000).with_length(100);
        let cancel = CancellationToken::new();
        let mut buf = vec![0.0; 256];

        assert_eq!(sine.read(&mut buf, 64, &cancel).unwrap(), StreamRead::Samples(64));
        assert_eq!(buf[0], buf[1]);
        assert_approx_eq::assert_approx_eq!(buf[2], sine.sample_at(1), 0.00001);

        assert_eq!(sine.read(&mut buf, 64, &cancel).unwrap(), StreamRead::Samples(36));
        assert_eq!(sine.read(&mut buf, 64, &cancel).unwrap(), StreamRead::EndOfStream);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let cancel = CancellationToken::new();
        let mut a = WhiteNoiseSource::new(1, 0.3, 1234);
        let mut b = WhiteNoiseSource::new(1, 0.3, 1234);
        let mut buf_a = vec![0.0; 32];
        let mut buf_b = vec![0.0; 32];
        a.read(&mut buf_a, 32, &cancel).unwrap();
        b.read(&mut buf_b, 32, &cancel).unwrap();
        assert_eq!(buf_a, buf_b);
        assert!(buf_a.iter().all(|x| x.abs() <= 0.3));
    }

    #[test]
    fn test_vec_source_chunking() {
        let cancel = CancellationToken::new();
        let mut src = VecSource::new((0..20).map(|i| i as f32).collect(), 2).with_max_chunk(3);
        let mut buf = vec![0.0; 20];
        assert_eq!(src.read(&mut buf, 8, &cancel).unwrap(), StreamRead::Samples(3));
        assert_eq!(&buf[..6], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(src.remaining_frames(), 7);
    }

    #[test]
    fn test_small_buffer_rejected() {
        let cancel = CancellationToken::new();
        let mut src = SineSource::new(4, 100.0, 1.0, 16000);
        let mut buf = vec![0.0; 10];
        assert!(src.read(&mut buf, 10, &cancel).is_err());
    }

    #[test]
    fn test_cancelled_read() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut src = WhiteNoiseSource::new(1, 1.0, 1);
        let mut buf = vec![0.0; 10];
        assert!(matches!(
            src.read(&mut buf, 10, &cancel),
            Err(BeamformError::Cancelled)
        ));
    }
}
