/// Split `frames` interleaved frames from `interleaved` into per-channel
/// buffers, writing each channel starting at `dest_offset`.
pub fn deinterleave_into(
    interleaved: &[f32],
    frames: usize,
    channel_buffers: &mut [Vec<f32>],
    dest_offset: usize,
) {
    let num_channels = channel_buffers.len();
    for (chan, target) in channel_buffers.iter_mut().enumerate() {
        let dest = &mut target[dest_offset..dest_offset + frames];
        for (out, frame) in dest
            .iter_mut()
            .zip(interleaved.chunks_exact(num_channels).take(frames))
        {
            *out = frame[chan];
        }
    }
}

/// Interleave equally long channel slices into `out`.
pub fn interleave_into(channels: &[&[f32]], out: &mut [f32]) {
    let num_channels = channels.len();
    for (chan, samples) in channels.iter().enumerate() {
        for (frame, sample) in out.chunks_exact_mut(num_channels).zip(samples.iter()) {
            frame[chan] = *sample;
        }
    }
}
