use rustfft::{num_complex::Complex, FftPlanner};
use serde::Deserialize;

use super::DoaError;
use crate::audio::frame::Loudness;
use crate::audio::AudioFrame;

const EPSILON: f32 = 1e-6;
const MAX_ANGLE: f32 = 90.0;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct StereoConfig {
    /// Weight of the time-difference angle in the fused estimate
    #[serde(default = "default_itd_weight")]
    pub itd_weight: f32,
    /// Weight of the level-difference angle in the fused estimate
    #[serde(default = "default_ild_weight")]
    pub ild_weight: f32,
    /// Largest interaural delay the geometry allows, in seconds
    #[serde(default = "default_max_itd")]
    pub max_itd: f32,
}

impl StereoConfig {
    /// Level difference only, no cross-correlation term.
    pub fn level_only() -> Self {
        Self {
            itd_weight: 0.0,
            ild_weight: 1.0,
            ..Self::default()
        }
    }
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            itd_weight: default_itd_weight(),
            ild_weight: default_ild_weight(),
            max_itd: default_max_itd(),
        }
    }
}

fn default_itd_weight() -> f32 { 0.7 }
fn default_ild_weight() -> f32 { 0.3 }
fn default_max_itd() -> f32 { 8e-4 }

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StereoEstimate {
    /// Delay of the right channel behind the left, in samples (positive: source on the left)
    pub lag_samples: isize,
    pub itd_angle: f32,
    pub ild_angle: f32,
    /// Weighted fusion of both cues, in [-90, 90]
    pub angle: f32,
}

/// Two-channel estimator fusing interaural time and level differences.
pub struct StereoEstimator {
    config: StereoConfig,
    planner: FftPlanner<f32>,
}

impl StereoEstimator {
    pub const CHANNELS: usize = 2;

    pub fn new(config: StereoConfig) -> Self {
        Self {
            config,
            planner: FftPlanner::new(),
        }
    }

    pub fn config(&self) -> &StereoConfig {
        &self.config
    }

    pub fn check_channels(frame: &AudioFrame) -> Result<(), DoaError> {
        if frame.channel_count() != Self::CHANNELS {
            return Err(DoaError::InvalidChannelConfiguration {
                expected: Self::CHANNELS,
                actual: frame.channel_count(),
            });
        }
        Ok(())
    }

    /// Estimates the angle of a DC-removed stereo frame.
    pub fn estimate(&mut self, frame: &AudioFrame, loudness: &Loudness) -> Result<StereoEstimate, DoaError> {
        Self::check_channels(frame)?;

        let ild_angle = level_difference_angle(loudness.get(0), loudness.get(1));

        let lag_samples = correlation_lag(&mut self.planner, frame.channel(0), frame.channel(1));
        let time_difference = lag_samples as f32 / frame.sample_rate() as f32;
        let itd_angle = if self.config.max_itd > 0.0 {
            (time_difference / self.config.max_itd * MAX_ANGLE).clamp(-MAX_ANGLE, MAX_ANGLE)
        } else {
            0.0
        };

        let angle = (self.config.itd_weight * itd_angle + self.config.ild_weight * ild_angle)
            .clamp(-MAX_ANGLE, MAX_ANGLE);

        log::trace!(
            "stereo: lag={} itd={:.2} ild={:.2} fused={:.2}",
            lag_samples, itd_angle, ild_angle, angle
        );

        Ok(StereoEstimate {
            lag_samples,
            itd_angle,
            ild_angle,
            angle,
        })
    }
}

/// Louder left channel gives a positive angle, louder right a negative one.
pub fn level_difference_angle(left: f32, right: f32) -> f32 {
    let diff = (left - right) / (left + right + EPSILON);
    (diff * MAX_ANGLE).clamp(-MAX_ANGLE, MAX_ANGLE)
}

/// Lag (in samples) maximizing the full cross-correlation of `left` and `right`.
///
/// Positive when `right` is a delayed copy of `left`. Covers every lag in
/// `-(n-1)..=(n-1)`; ties go to the most negative lag.
pub fn correlation_lag(planner: &mut FftPlanner<f32>, left: &[f32], right: &[f32]) -> isize {
    let n = left.len().min(right.len());
    if n < 2 {
        return 0;
    }

    // Padding to >= 2n-1 keeps the circular correlation free of wrap-around
    let nfft = (2 * n - 1).next_power_of_two();
    let fft = planner.plan_fft_forward(nfft);
    let ifft = planner.plan_fft_inverse(nfft);

    let mut l_spec: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); nfft];
    let mut r_spec: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); nfft];
    for i in 0..n {
        l_spec[i].re = left[i];
        r_spec[i].re = right[i];
    }
    fft.process(&mut l_spec);
    fft.process(&mut r_spec);

    // c[m] = sum_k right[k + m] * left[k]  <=>  C = R * conj(L)
    let mut corr: Vec<Complex<f32>> = r_spec
        .iter()
        .zip(l_spec.iter())
        .map(|(r, l)| r * l.conj())
        .collect();
    ifft.process(&mut corr);

    let max_lag = n as isize - 1;
    let mut best_lag = -max_lag;
    let mut best_val = f32::NEG_INFINITY;
    for lag in -max_lag..=max_lag {
        let idx = if lag < 0 { (nfft as isize + lag) as usize } else { lag as usize };
        let val = corr[idx].re;
        if val > best_val {
            best_val = val;
            best_lag = lag;
        }
    }

    best_lag
}
