/// speed of sound in air at room temperature
pub const SPEED_OF_SOUND_MM_PER_SECOND: f32 = 343_000.0;

/// how far sound travels during one sample period
pub fn speed_of_sound_mm_per_sample(samplerate: u32) -> f32 {
    SPEED_OF_SOUND_MM_PER_SECOND / samplerate as f32
}

/// number of samples per channel covering `millis` milliseconds,
/// truncated towards zero
pub fn samples_for_duration(samplerate: u32, millis: u64) -> usize {
    (samplerate as u64 * millis / 1000) as usize
}

pub fn degrees_to_radians(deg: f32) -> f32 {
    deg * std::f32::consts::PI / 180.0
}

pub fn radians_to_degrees(rad: f32) -> f32 {
    rad * 180.0 / std::f32::consts::PI
}
