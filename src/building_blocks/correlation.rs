/// Normalized cross-correlation of two equally long windows,
/// `a[a_offset..a_offset + len]` against `b[b_offset..b_offset + len]`.
///
/// Returns a value in [-1, 1]. If either window carries no energy
/// (digital silence), the correlation is 0.
///
/// Offsets are always non-negative, so a negative lag between two
/// signals is expressed by offsetting the other signal instead.
pub fn normalized_cross_correlation(
    a: &[f32],
    a_offset: usize,
    b: &[f32],
    b_offset: usize,
    len: usize,
) -> f32 {
    let a_win = &a[a_offset..a_offset + len];
    let b_win = &b[b_offset..b_offset + len];

    // accumulate in f64, 20ms windows at high sample rates add up quickly
    let mut dot = 0.0_f64;
    let mut a_energy = 0.0_f64;
    let mut b_energy = 0.0_f64;
    for (x, y) in a_win.iter().zip(b_win.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        a_energy += x * x;
        b_energy += y * y;
    }

    let denominator = (a_energy * b_energy).sqrt();
    if denominator <= f64::EPSILON {
        0.0
    } else {
        (dot / denominator).clamp(-1.0, 1.0) as f32
    }
}

/// Correlation of two signals at a signed lag, where a positive lag
/// means `b` leads `a` by that many samples.
pub fn lagged_correlation(a: &[f32], b: &[f32], lag: i32, len: usize) -> f32 {
    if lag > 0 {
        normalized_cross_correlation(a, lag as usize, b, 0, len)
    } else {
        normalized_cross_correlation(a, 0, b, lag.unsigned_abs() as usize, len)
    }
}
