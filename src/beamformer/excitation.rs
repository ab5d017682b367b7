use crate::array::MicPair;
use crate::beamformer::{ContributingFactor, ExcitationConfig};
use crate::helpers::units::degrees_to_radians;

/**
 * Turns the per-slice cross-correlations of every mic pair into a
 * per-attention-point score in [0, 1], roughly "how likely is it that
 * sound is coming from there right now".
 *
 * Each positive correlation is spread over the attention points whose
 * angle (relative to that pair) is close to the correlated delay's angle,
 * weighted by a trapezoid window.
 */
#[derive(Clone, Debug)]
pub struct ExcitationEstimator {
    window_min: f32,
    window_max: f32,
    decay_rate: f32,
    excitation: Vec<f32>,
    current: Vec<f32>,
}

impl ExcitationEstimator {
    pub fn new(config: &ExcitationConfig, num_attention_points: usize) -> Self {
        ExcitationEstimator {
            window_min: degrees_to_radians(config.window_min_degrees),
            window_max: degrees_to_radians(config.window_max_degrees),
            decay_rate: config.decay_rate,
            excitation: vec![0.0; num_attention_points],
            current: vec![0.0; num_attention_points],
        }
    }

    /// 1 inside the inner window, fading linearly to 0 at the outer edge
    pub fn window(&self, angle_difference: f32) -> f32 {
        let diff = angle_difference.abs();
        if diff < self.window_min {
            1.0
        } else if diff < self.window_max {
            1.0 - (diff - self.window_min) / (self.window_max - self.window_min)
        } else {
            0.0
        }
    }

    /// `correlations[p][k]` belongs to entry `k` of `mic_pairs[p]`'s table
    pub fn update(
        &mut self,
        mic_pairs: &[MicPair],
        factors: &[ContributingFactor],
        correlations: &[Vec<f32>],
    ) {
        self.current.iter_mut().for_each(|x| *x = 0.0);

        for factor in factors {
            let table = mic_pairs[factor.pair_index].vector_angle_offsets();
            for (&(entry_angle, _), &corr) in table.iter().zip(correlations[factor.pair_index].iter()) {
                if corr <= 0.0 {
                    continue;
                }
                let windowed = self.window(factor.angle - entry_angle);
                if windowed > 0.0 {
                    self.current[factor.attention_point_index] += corr * windowed * self.decay_rate;
                }
            }
        }

        let keep = 1.0 - self.decay_rate;
        let mut max = 0.0_f32;
        for (exc, cur) in self.excitation.iter_mut().zip(self.current.iter()) {
            *exc = *exc * keep + *cur;
            max = max.max(*exc);
        }

        if max > 0.0 {
            self.excitation.iter_mut().for_each(|x| *x /= max);
        }
    }

    pub fn excitation(&self) -> &[f32] {
        &self.excitation
    }

    /// index of the most excited attention point, None while everything is silent
    pub fn strongest_attention_point(&self) -> Option<usize> {
        let mut best = None;
        let mut best_val = 0.0;
        for (idx, val) in self.excitation.iter().enumerate() {
            if *val > best_val {
                best_val = *val;
                best = Some(idx);
            }
        }
        best
    }

    pub fn reset(&mut self) {
        self.excitation.iter_mut().for_each(|x| *x = 0.0);
    }
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;
    use crate::building_blocks::Vector3;
    use std::f32::consts::FRAC_PI_2;

    fn pair() -> MicPair {
        MicPair::new(
            0,
            1,
            Vector3::new(-30.0, 0.0, 0.0),
            Vector3::new(30.0, 0.0, 0.0),
            16000,
            1.0,
        )
        .unwrap()
    }

    fn factor(point: usize, angle: f32) -> ContributingFactor {
        ContributingFactor {
            attention_point_index: point,
            pair_index: 0,
            channel_a: 0,
            channel_b: 1,
            angle,
            delay_one: 0,
            delay_two: 0,
            blend_towards_two: 0.0,
        }
    }

    #[test]
    fn test_window_shape() {
        let est = ExcitationEstimator::new(&ExcitationConfig::default(), 1);
        assert_eq!(est.window(0.0), 1.0);
        assert_eq!(est.window(degrees_to_radians(-5.0)), 1.0);
        assert_approx_eq::assert_approx_eq!(est.window(degrees_to_radians(20.0)), 0.5, 0.0001);
        assert_eq!(est.window(degrees_to_radians(30.0)), 0.0);
        assert_eq!(est.window(degrees_to_radians(90.0)), 0.0);
    }

    #[test]
    fn test_broadside_correlation_excites_broadside_point() {
        let pairs = vec![pair()];
        // table is [-3, -2, -1, 0, 1, 2, 3], only the zero delay correlates
        let correlations = vec![vec![-0.2, 0.0, 0.1, 0.9, 0.1, 0.0, -0.2]];
        let factors = vec![factor(0, FRAC_PI_2), factor(1, 0.0)];

        let mut est = ExcitationEstimator::new(&ExcitationConfig::default(), 2);
        est.update(&pairs, &factors, &correlations);

        assert_eq!(est.excitation()[0], 1.0);
        assert!(est.excitation()[1] < 0.2);
        assert_eq!(est.strongest_attention_point(), Some(0));
    }

    #[test]
    fn test_silence_is_not_excited() {
        let pairs = vec![pair()];
        let correlations = vec![vec![0.0; 7]];
        let factors = vec![factor(0, FRAC_PI_2)];

        let mut est = ExcitationEstimator::new(&ExcitationConfig::default(), 1);
        est.update(&pairs, &factors, &correlations);
        assert_eq!(est.excitation(), &[0.0]);
        assert_eq!(est.strongest_attention_point(), None);
    }

    #[test]
    fn test_slow_decay_keeps_history() {
        let pairs = vec![pair()];
        let factors = vec![factor(0, FRAC_PI_2), factor(1, 0.0)];
        let config = ExcitationConfig {
            enabled: true,
            decay_rate: 0.1,
            ..Default::default()
        };
        let mut est = ExcitationEstimator::new(&config, 2);

        // end-fire first, then broadside
        est.update(&pairs, &factors, &vec![vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.9]]);
        assert_eq!(est.strongest_attention_point(), Some(1));
        est.update(&pairs, &factors, &vec![vec![0.0, 0.0, 0.0, 0.9, 0.0, 0.0, 0.0]]);

        // one slice of broadside is not enough to forget about end-fire
        assert_eq!(est.strongest_attention_point(), Some(1));
        assert!(est.excitation()[0] > 0.0);

        est.reset();
        assert_eq!(est.strongest_attention_point(), None);
    }
}
