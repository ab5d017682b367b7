use std::collections::HashSet;
use std::f32::consts::{FRAC_PI_2, PI};

use crate::building_blocks::Vector3;
use crate::error::{BeamformError, Result};
use crate::helpers::units::{degrees_to_radians, speed_of_sound_mm_per_sample};

/**
 * Two elements of an array microphone, plus a lookup table that maps
 * angles of incidence (relative to the axis from A to B) to integer
 * sample delays between the two channels.
 *
 * A positive offset means B hears the sound first, by that many samples.
 */
#[derive(Clone, Debug)]
pub struct MicPair {
    a_index: usize,
    b_index: usize,
    element_separation_mm: f32,
    element_separation_samples: f32,
    primary_axis: Vector3,
    centroid: Vector3,
    vector_angle_offsets: Vec<(f32, i32)>,
}

impl MicPair {
    pub fn new(
        a_index: usize,
        b_index: usize,
        a_position: Vector3,
        b_position: Vector3,
        sample_rate: u32,
        angle_resolution_degrees: f32,
    ) -> Result<Self> {
        if a_index == b_index {
            return Err(BeamformError::InvalidPairing {
                a: a_index,
                b: b_index,
                elements: a_index.max(b_index) + 1,
            });
        }
        if sample_rate == 0 {
            return Err(BeamformError::InvalidSampleRate(sample_rate));
        }
        // written this way round so NaN fails too
        if !(angle_resolution_degrees > 0.0 && angle_resolution_degrees <= 90.0) {
            return Err(BeamformError::InvalidAngleResolution(angle_resolution_degrees));
        }

        let axis = b_position - a_position;
        let element_separation_mm = axis.magnitude();
        if axis.is_zero() {
            return Err(BeamformError::DegenerateMicPair {
                a: a_index,
                b: b_index,
            });
        }

        let mm_per_sample = speed_of_sound_mm_per_sample(sample_rate);
        let element_separation_samples = element_separation_mm / mm_per_sample;
        let resolution = degrees_to_radians(angle_resolution_degrees);

        let vector_angle_offsets = build_angle_table(
            element_separation_mm,
            element_separation_samples,
            mm_per_sample,
            resolution,
        );

        Ok(MicPair {
            a_index,
            b_index,
            element_separation_mm,
            element_separation_samples,
            primary_axis: axis / element_separation_mm,
            centroid: (a_position + b_position) / 2.0,
            vector_angle_offsets,
        })
    }

    pub fn a_index(&self) -> usize {
        self.a_index
    }

    pub fn b_index(&self) -> usize {
        self.b_index
    }

    pub fn element_separation_mm(&self) -> f32 {
        self.element_separation_mm
    }

    pub fn element_separation_samples(&self) -> f32 {
        self.element_separation_samples
    }

    /// unit vector pointing from A to B
    pub fn primary_axis(&self) -> Vector3 {
        self.primary_axis
    }

    pub fn centroid(&self) -> Vector3 {
        self.centroid
    }

    /// (incidence angle in radians, signed sample offset), ascending by offset
    pub fn vector_angle_offsets(&self) -> &[(f32, i32)] {
        &self.vector_angle_offsets
    }
}

fn build_angle_table(
    separation_mm: f32,
    separation_samples: f32,
    mm_per_sample: f32,
    resolution_radians: f32,
) -> Vec<(f32, i32)> {
    let mut table = vec![(FRAC_PI_2, 0)];
    let mut used_buckets: HashSet<i64> = HashSet::new();
    used_buckets.insert(0);

    let max_delay = separation_samples.round() as i32;
    for delay in 1..=max_delay {
        let delay_mm = delay as f32 * mm_per_sample;
        let angle = if delay_mm >= separation_mm {
            0.0
        } else {
            (delay_mm / separation_mm).acos()
        };

        // ceil first, floor only if that one is taken
        let z = (FRAC_PI_2 - angle) / resolution_radians;
        let bucket = [z.ceil() as i64, z.floor() as i64]
            .into_iter()
            .find(|b| !used_buckets.contains(b));

        if let Some(bucket) = bucket {
            used_buckets.insert(bucket);
            table.push((angle, delay));
            table.push((PI - angle, -delay));
        }
    }

    table.sort_by_key(|&(_, offset)| offset);
    table
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;

    fn pair(sep_mm: f32, sample_rate: u32, resolution: f32) -> MicPair {
        MicPair::new(
            0,
            1,
            Vector3::new(-sep_mm / 2.0, 0.0, 0.0),
            Vector3::new(sep_mm / 2.0, 0.0, 0.0),
            sample_rate,
            resolution,
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_construction() {
        let a = Vector3::new(-10.0, 0.0, 0.0);
        let b = Vector3::new(10.0, 0.0, 0.0);
        assert!(MicPair::new(1, 1, a, b, 48000, 1.0).is_err());
        assert!(matches!(
            MicPair::new(0, 1, a, b, 0, 1.0),
            Err(BeamformError::InvalidSampleRate(0))
        ));
        assert!(matches!(
            MicPair::new(0, 1, a, b, 48000, 0.0),
            Err(BeamformError::InvalidAngleResolution(_))
        ));
        assert!(MicPair::new(0, 1, a, b, 48000, 90.5).is_err());
        assert!(MicPair::new(0, 1, a, b, 48000, f32::NAN).is_err());
        assert!(matches!(
            MicPair::new(0, 1, a, a, 48000, 1.0),
            Err(BeamformError::DegenerateMicPair { a: 0, b: 1 })
        ));
    }

    #[test]
    fn test_basic_properties() {
        let p = MicPair::new(
            2,
            0,
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 60.0, 0.0),
            48000,
            1.0,
        )
        .unwrap();
        assert_eq!(p.a_index(), 2);
        assert_eq!(p.b_index(), 0);
        assert_approx_eq::assert_approx_eq!(p.element_separation_mm(), 60.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(
            p.element_separation_samples(),
            60.0 / (343000.0 / 48000.0),
            0.0001
        );
        assert_approx_eq::assert_approx_eq!(p.primary_axis().y, 1.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(p.centroid().y, 30.0, 0.0001);
    }

    #[test]
    fn test_low_sample_rate_table() {
        // 21.4375 mm per sample, so delays 1, 2 and 3 (clamped to 0 degrees)
        let p = pair(60.0, 16000, 1.0);
        let table = p.vector_angle_offsets();
        assert_eq!(table.len(), 7);

        let offsets: Vec<i32> = table.iter().map(|e| e.1).collect();
        assert_eq!(offsets, vec![-3, -2, -1, 0, 1, 2, 3]);

        assert_approx_eq::assert_approx_eq!(table[6].0, 0.0, 0.0001);
        assert_approx_eq::assert_approx_eq!(table[0].0, PI, 0.0001);
        assert_approx_eq::assert_approx_eq!(table[4].0, (21.4375_f32 / 60.0).acos(), 0.0001);
    }

    #[test]
    fn test_table_symmetry_and_order() {
        for &(sep, rate, res) in &[
            (60.0, 48000, 1.0),
            (150.0, 44100, 1.0),
            (20.0, 16000, 5.0),
            (300.0, 96000, 0.5),
        ] {
            let p = pair(sep, rate, res);
            let table = p.vector_angle_offsets();

            assert!(table
                .iter()
                .any(|&(angle, off)| off == 0 && (angle - FRAC_PI_2).abs() < 0.00001));
            assert!(table.windows(2).all(|w| w[0].1 < w[1].1));

            for &(angle, off) in table {
                if off != 0 {
                    assert!(table
                        .iter()
                        .any(|&(a2, o2)| o2 == -off && (a2 - (PI - angle)).abs() < 0.0001));
                }
            }
        }
    }

    #[test]
    fn test_buckets_collapse_indistinguishable_delays() {
        // at 96kHz and 300mm there are ~84 delays but far fewer 10 degree buckets
        let fine = pair(300.0, 96000, 1.0);
        let coarse = pair(300.0, 96000, 10.0);
        assert!(coarse.vector_angle_offsets().len() < fine.vector_angle_offsets().len());
        // 9 buckets on each side of broadside at most, plus the zero entry
        assert!(coarse.vector_angle_offsets().len() <= 19);
    }

    #[test]
    fn test_maximum_resolution() {
        // a single bucket on each side survives
        let p = pair(60.0, 16000, 90.0);
        let offsets: Vec<i32> = p.vector_angle_offsets().iter().map(|e| e.1).collect();
        assert_eq!(offsets, vec![-1, 0, 1]);
    }

    #[test]
    fn test_tiny_separation() {
        // less than half a sample apart, nothing but broadside
        let p = pair(2.0, 16000, 1.0);
        assert_eq!(p.vector_angle_offsets(), &[(FRAC_PI_2, 0)]);
    }
}
