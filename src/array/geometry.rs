use std::f32::consts::PI;

use crate::building_blocks::Vector3;
use crate::error::{BeamformError, Result};
use crate::helpers::units::speed_of_sound_mm_per_sample;

/**
 * The physical layout of an array microphone. Positions are in
 * millimeters and normalized so that their centroid is the origin.
 */
#[derive(Clone, Debug)]
pub struct ArrayMicrophoneGeometry {
    positions: Vec<Vector3>,
    radius: f32,
    max_element_separation: f32,
    pairings: Vec<(usize, usize)>,
}

impl ArrayMicrophoneGeometry {
    /// geometry without any suggested pairings, the beamformer
    /// will pair up every element with every other one
    pub fn new(raw_positions: &[Vector3]) -> Result<Self> {
        Self::with_pairings(raw_positions, &[])
    }

    pub fn with_pairings(raw_positions: &[Vector3], pairings: &[(usize, usize)]) -> Result<Self> {
        if raw_positions.is_empty() {
            return Err(BeamformError::EmptyGeometry);
        }

        let elements = raw_positions.len();
        for &(a, b) in pairings {
            if a >= elements || b >= elements || a == b {
                return Err(BeamformError::InvalidPairing { a, b, elements });
            }
        }

        Ok(Self::build(raw_positions, pairings))
    }

    /// normalizes and measures a non-empty, already validated layout
    fn build(raw_positions: &[Vector3], pairings: &[(usize, usize)]) -> Self {
        let elements = raw_positions.len();
        let mut centroid = Vector3::ZERO;
        for pos in raw_positions {
            centroid += *pos;
        }
        centroid = centroid / elements as f32;

        let positions: Vec<Vector3> = raw_positions.iter().map(|p| *p - centroid).collect();

        let radius = positions
            .iter()
            .map(|p| p.magnitude())
            .fold(0.0_f32, f32::max);

        let mut max_element_separation = 0.0_f32;
        for (i, a) in positions.iter().enumerate() {
            for b in positions.iter().skip(i + 1) {
                max_element_separation = max_element_separation.max(a.distance(*b));
            }
        }

        ArrayMicrophoneGeometry {
            positions,
            radius,
            max_element_separation,
            pairings: pairings.to_vec(),
        }
    }

    /// The four-element linear array of the PS3 Eye camera, 20mm pitch,
    /// elements ordered left to right along the x axis.
    pub fn ps3_eye() -> Self {
        Self::linear_unchecked(4, 20.0)
    }

    /// `count` elements on a line along the x axis
    pub fn linear(count: usize, spacing_mm: f32) -> Result<Self> {
        if spacing_mm <= 0.0 {
            return Err(BeamformError::out_of_range("element spacing must be positive"));
        }
        if count == 0 {
            return Err(BeamformError::EmptyGeometry);
        }
        Ok(Self::linear_unchecked(count, spacing_mm))
    }

    // count must be non-zero
    fn linear_unchecked(count: usize, spacing_mm: f32) -> Self {
        let positions: Vec<Vector3> = (0..count)
            .map(|i| Vector3::new(i as f32 * spacing_mm, 0.0, 0.0))
            .collect();
        Self::build(&positions, &[])
    }

    /// `count` elements evenly spaced on a horizontal ring
    pub fn circular(count: usize, radius_mm: f32) -> Result<Self> {
        if radius_mm <= 0.0 {
            return Err(BeamformError::out_of_range("ring radius must be positive"));
        }
        if count == 0 {
            return Err(BeamformError::EmptyGeometry);
        }
        let positions: Vec<Vector3> = (0..count)
            .map(|i| {
                let theta = 2.0 * PI * i as f32 / count as f32;
                Vector3::new(theta.cos() * radius_mm, theta.sin() * radius_mm, 0.0)
            })
            .collect();
        Self::new(&positions)
    }

    pub fn positions(&self) -> &[Vector3] {
        &self.positions
    }

    pub fn num_elements(&self) -> usize {
        self.positions.len()
    }

    /// distance of the farthest element from the centroid
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn max_element_separation(&self) -> f32 {
        self.max_element_separation
    }

    /// suggested pairings, may be empty
    pub fn pairings(&self) -> &[(usize, usize)] {
        &self.pairings
    }

    /// the suggested pairings, or every possible pair if there are none
    pub fn effective_pairings(&self) -> Vec<(usize, usize)> {
        if !self.pairings.is_empty() {
            return self.pairings.clone();
        }

        let n = self.num_elements();
        let mut all = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for a in 0..n.saturating_sub(1) {
            for b in a + 1..n {
                all.push((a, b));
            }
        }
        all
    }

    /// Integer per-element delays (in samples) for sound travelling from
    /// `source_mm` to each element, relative to the element that hears it first.
    /// The smallest delay is always 0.
    pub fn propagation_delays(&self, source_mm: Vector3, sample_rate: u32, out: &mut [usize]) {
        let mm_per_sample = speed_of_sound_mm_per_sample(sample_rate);

        let min_delay = self
            .positions
            .iter()
            .map(|p| p.distance(source_mm) / mm_per_sample)
            .fold(f32::INFINITY, f32::min);

        for (delay, pos) in out.iter_mut().zip(self.positions.iter()) {
            // ties go to the even delay
            *delay = (pos.distance(source_mm) / mm_per_sample - min_delay).round_ties_even() as usize;
        }
    }
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_centered() {
        let geo = ArrayMicrophoneGeometry::new(&[
            Vector3::new(10.0, 5.0, 0.0),
            Vector3::new(30.0, 5.0, 0.0),
            Vector3::new(20.0, 25.0, 3.0),
        ])
        .unwrap();

        let mut sum = Vector3::ZERO;
        for p in geo.positions() {
            sum += *p;
        }
        assert_approx_eq::assert_approx_eq!(sum.x, 0.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(sum.y, 0.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(sum.z, 0.0, 0.0001);

        let max_mag = geo
            .positions()
            .iter()
            .map(|p| p.magnitude())
            .fold(0.0, f32::max);
        assert_approx_eq::assert_approx_eq!(geo.radius(), max_mag, 0.0001);

        // longest pair is element 0 to element 2
        let expected_sep = Vector3::new(10.0, 20.0, 3.0).magnitude();
        assert_approx_eq::assert_approx_eq!(geo.max_element_separation(), expected_sep, 0.0001);
    }

    #[test]
    fn test_bar_geometry() {
        let geo = ArrayMicrophoneGeometry::new(&[
            Vector3::new(-75.0, 0.0, 0.0),
            Vector3::new(-25.0, 0.0, 0.0),
            Vector3::new(25.0, 0.0, 0.0),
            Vector3::new(75.0, 0.0, 0.0),
        ])
        .unwrap();
        assert_approx_eq::assert_approx_eq!(geo.radius(), 75.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(geo.max_element_separation(), 150.0, 0.0001);
    }

    #[test]
    fn test_empty_geometry_rejected() {
        assert!(matches!(
            ArrayMicrophoneGeometry::new(&[]),
            Err(BeamformError::EmptyGeometry)
        ));
    }

    #[test]
    fn test_single_element() {
        let geo = ArrayMicrophoneGeometry::new(&[Vector3::new(4.0, 4.0, 4.0)]).unwrap();
        assert_eq!(geo.positions()[0], Vector3::ZERO);
        assert_eq!(geo.radius(), 0.0);
        assert_eq!(geo.max_element_separation(), 0.0);
        assert!(geo.effective_pairings().is_empty());
    }

    #[test]
    fn test_bad_pairings_rejected() {
        let pos = [Vector3::new(-10.0, 0.0, 0.0), Vector3::new(10.0, 0.0, 0.0)];
        assert!(ArrayMicrophoneGeometry::with_pairings(&pos, &[(0, 2)]).is_err());
        assert!(ArrayMicrophoneGeometry::with_pairings(&pos, &[(1, 1)]).is_err());
        assert!(ArrayMicrophoneGeometry::with_pairings(&pos, &[(1, 0)]).is_ok());
    }

    #[test]
    fn test_effective_pairings() {
        let geo = ArrayMicrophoneGeometry::ps3_eye();
        assert_eq!(
            geo.effective_pairings(),
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
        );

        let pos = geo.positions().to_vec();
        let curated = ArrayMicrophoneGeometry::with_pairings(&pos, &[(0, 3)]).unwrap();
        assert_eq!(curated.effective_pairings(), vec![(0, 3)]);
    }

    #[test]
    fn test_presets() {
        let eye = ArrayMicrophoneGeometry::ps3_eye();
        assert_eq!(eye.num_elements(), 4);
        assert_approx_eq::assert_approx_eq!(eye.max_element_separation(), 60.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(eye.positions()[0].x, -30.0, 0.0001);

        let ring = ArrayMicrophoneGeometry::circular(6, 50.0).unwrap();
        assert_approx_eq::assert_approx_eq!(ring.radius(), 50.0, 0.001);
        assert_approx_eq::assert_approx_eq!(ring.max_element_separation(), 100.0, 0.001);

        assert!(ArrayMicrophoneGeometry::linear(3, 0.0).is_err());
        assert!(ArrayMicrophoneGeometry::circular(0, 10.0).is_err());
    }

    #[test]
    fn test_propagation_delays() {
        let geo = ArrayMicrophoneGeometry::linear(4, 50.0).unwrap();
        let mut delays = [99; 4];

        geo.propagation_delays(Vector3::new(1500.0, 0.0, 0.0), 48000, &mut delays);
        assert_eq!(delays, [21, 14, 7, 0]);

        // broadside and far away, everything arrives at once
        geo.propagation_delays(Vector3::new(0.0, 5000.0, 0.0), 48000, &mut delays);
        assert_eq!(delays, [0, 0, 0, 0]);
    }

    #[test]
    fn test_propagation_delay_ties_round_to_even() {
        // at 343Hz sound travels exactly one meter per sample
        let geo = ArrayMicrophoneGeometry::new(&[
            Vector3::new(-1250.0, 0.0, 0.0),
            Vector3::new(1250.0, 0.0, 0.0),
        ])
        .unwrap();
        let mut delays = [99; 2];

        // 6.25 - 3.75 samples is exactly 2.5
        geo.propagation_delays(Vector3::new(5000.0, 0.0, 0.0), 343, &mut delays);
        assert_eq!(delays, [2, 0]);
    }
}
