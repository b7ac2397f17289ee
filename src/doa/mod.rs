//! Direction-of-arrival estimation.
//!
//! Each frame goes through DC removal, loudness analysis and the silence
//! gate before reaching the estimator selected for the stream's channel
//! layout. Estimates are smoothed over a short history owned by the
//! [`Engine`], so independent engines never influence each other.

pub mod error;
pub mod smoother;
pub mod stereo;
pub mod surround;

pub use error::DoaError;

use crate::audio::frame::{channel_loudness, remove_dc};
use crate::audio::AudioFrame;
use smoother::{AngleSmoother, DEFAULT_HISTORY};
use stereo::{StereoConfig, StereoEstimator};
use surround::{ChannelAngleMap, SurroundEstimator, SURROUND_CHANNELS};

pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Total loudness below which a frame counts as silent
    pub silence_threshold: f32,
    /// Number of estimates averaged by the smoother
    pub history: usize,
    pub stereo: StereoConfig,
    pub surround_map: ChannelAngleMap,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            history: DEFAULT_HISTORY,
            stereo: StereoConfig::default(),
            surround_map: ChannelAngleMap::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SilenceGate {
    pub threshold: f32,
}

impl SilenceGate {
    pub fn is_silent(&self, total_loudness: f32) -> bool {
        total_loudness < self.threshold
    }
}

/// Estimator chosen once from the stream's channel count.
pub enum EstimatorMode {
    Stereo(StereoEstimator),
    Surround(SurroundEstimator),
}

impl EstimatorMode {
    pub fn for_channels(channels: usize, config: &EngineConfig) -> Result<Self, DoaError> {
        match channels {
            StereoEstimator::CHANNELS => Ok(EstimatorMode::Stereo(StereoEstimator::new(config.stereo))),
            SURROUND_CHANNELS => Ok(EstimatorMode::Surround(SurroundEstimator::new(config.surround_map))),
            other => Err(DoaError::UnsupportedChannelConfiguration(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EstimatorMode::Stereo(_) => "stereo",
            EstimatorMode::Surround(_) => "surround",
        }
    }

    fn check_channels(&self, frame: &AudioFrame) -> Result<(), DoaError> {
        match self {
            EstimatorMode::Stereo(_) => StereoEstimator::check_channels(frame),
            EstimatorMode::Surround(_) => SurroundEstimator::check_channels(frame),
        }
    }
}

/// Per-frame result with the intermediate values behind the angle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Analysis {
    /// Smoothed angle in degrees; 0 for silent frames
    pub angle: f32,
    /// This frame's estimate before smoothing (None when gated)
    pub raw_angle: Option<f32>,
    /// Sum of per-channel mean absolute amplitudes
    pub loudness: f32,
    /// Correlation lag, stereo frames only
    pub lag_samples: Option<isize>,
    pub silent: bool,
}

pub struct Engine {
    mode: EstimatorMode,
    gate: SilenceGate,
    smoother: AngleSmoother,
}

impl Engine {
    pub fn new(config: EngineConfig, channels: usize) -> Result<Self, DoaError> {
        let mode = EstimatorMode::for_channels(channels, &config)?;
        log::debug!(
            "DoA engine: {} mode, threshold={}, history={}",
            mode.name(),
            config.silence_threshold,
            config.history
        );
        Ok(Self {
            mode,
            gate: SilenceGate {
                threshold: config.silence_threshold,
            },
            smoother: AngleSmoother::new(config.history),
        })
    }

    pub fn mode(&self) -> &EstimatorMode {
        &self.mode
    }

    pub fn smoother(&self) -> &AngleSmoother {
        &self.smoother
    }

    /// Smoothed angle for this frame, in degrees.
    pub fn estimate(&mut self, frame: &AudioFrame) -> Result<f32, DoaError> {
        self.analyze(frame).map(|a| a.angle)
    }

    pub fn analyze(&mut self, frame: &AudioFrame) -> Result<Analysis, DoaError> {
        let channels = frame.channel_count();
        if channels != StereoEstimator::CHANNELS && channels != SURROUND_CHANNELS {
            return Err(DoaError::UnsupportedChannelConfiguration(channels));
        }
        self.mode.check_channels(frame)?;

        let clean = remove_dc(frame);
        let loudness = channel_loudness(&clean);
        let total = loudness.total();
        // NaN would slip past the gate's comparison and poison the smoother
        if !total.is_finite() {
            return Err(DoaError::MalformedFrame(format!("non-finite loudness {}", total)));
        }

        if self.gate.is_silent(total) {
            self.smoother.clear();
            return Ok(Analysis {
                angle: 0.0,
                raw_angle: None,
                loudness: total,
                lag_samples: None,
                silent: true,
            });
        }

        let (raw, lag_samples) = match &mut self.mode {
            EstimatorMode::Stereo(est) => {
                let stereo = est.estimate(&clean, &loudness)?;
                (stereo.angle, Some(stereo.lag_samples))
            }
            EstimatorMode::Surround(est) => (est.estimate(&clean, &loudness)?, None),
        };

        let angle = self.smoother.push(raw);
        Ok(Analysis {
            angle,
            raw_angle: Some(raw),
            loudness: total,
            lag_samples,
            silent: false,
        })
    }

    pub fn reset(&mut self) {
        self.smoother.clear();
    }
}
