pub mod correlation;
pub mod pool;
pub mod sources;
pub mod vector;

// crossbeam for the cancellation flag
use crossbeam::atomic::AtomicCell;
use std::sync::Arc;

use crate::error::Result;

pub use crate::building_blocks::vector::Vector3;

/// outcome of a read from an upstream source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamRead {
    /// number of samples per channel that were written to the buffer,
    /// zero means "nothing right now, try again later"
    Samples(usize),
    /// the source is finished and will never produce anything again
    EndOfStream,
}

/// A shared flag to abort pending reads and writes.
/// Clones observe the same flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicCell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load()
    }
}

/// Anything that produces interleaved float samples, pull-style.
pub trait SampleSource {
    fn channels(&self) -> usize;

    /// Read up to `samples_per_channel` frames into the start of `buffer`,
    /// which has room for at least `samples_per_channel * channels()` samples.
    fn read(
        &mut self,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead>;
}

/// Anything that consumes interleaved float samples, push-style.
pub trait SampleSink {
    fn write(
        &mut self,
        buffer: &[f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn read(
        &mut self,
        buffer: &mut [f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<StreamRead> {
        (**self).read(buffer, samples_per_channel, cancel)
    }
}

impl<W: SampleSink + ?Sized> SampleSink for Box<W> {
    fn write(
        &mut self,
        buffer: &[f32],
        samples_per_channel: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        (**self).write(buffer, samples_per_channel, cancel)
    }
}
