use super::DoaError;
use crate::audio::frame::Loudness;
use crate::audio::AudioFrame;

pub const SURROUND_CHANNELS: usize = 8;

/// Fixed direction of each 7.1 channel, in degrees (positive to the left),
/// always within [-180, 180). `None` marks a channel without a direction,
/// i.e. the subwoofer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelAngleMap([Option<f32>; SURROUND_CHANNELS]);

impl ChannelAngleMap {
    /// Wraps each angle into [-180, 180); 270 becomes -90.
    pub fn new(angles: [Option<f32>; SURROUND_CHANNELS]) -> Result<Self, DoaError> {
        let mut wrapped = angles;
        for (channel, slot) in wrapped.iter_mut().enumerate() {
            if let Some(angle) = slot {
                if !angle.is_finite() {
                    return Err(DoaError::InvalidAngleMap { channel, angle: *angle });
                }
                *angle = wrap_degrees(*angle);
            }
        }
        Ok(Self(wrapped))
    }

    pub fn angle(&self, channel: usize) -> Option<f32> {
        self.0.get(channel).copied().flatten()
    }
}

fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

impl Default for ChannelAngleMap {
    /// FL, FR, C, SL, SR, RL, RR, LFE
    fn default() -> Self {
        Self([
            Some(30.0),
            Some(-30.0),
            Some(0.0),
            Some(90.0),
            Some(-90.0),
            Some(150.0),
            Some(-150.0),
            None,
        ])
    }
}

/// Weighted centroid of the channel directions, each channel weighted by its loudness.
///
/// Simultaneous sources blend into one direction between them instead of
/// snapping to the loudest channel.
#[derive(Clone, Debug, Default)]
pub struct SurroundEstimator {
    map: ChannelAngleMap,
}

impl SurroundEstimator {
    pub fn new(map: ChannelAngleMap) -> Self {
        Self { map }
    }

    pub fn check_channels(frame: &AudioFrame) -> Result<(), DoaError> {
        if frame.channel_count() != SURROUND_CHANNELS {
            return Err(DoaError::InvalidChannelConfiguration {
                expected: SURROUND_CHANNELS,
                actual: frame.channel_count(),
            });
        }
        Ok(())
    }

    pub fn estimate(&self, frame: &AudioFrame, loudness: &Loudness) -> Result<f32, DoaError> {
        Self::check_channels(frame)?;
        Ok(self.centroid(loudness))
    }

    fn centroid(&self, loudness: &Loudness) -> f32 {
        let (weighted, weight) = loudness
            .per_channel()
            .iter()
            .enumerate()
            .filter_map(|(i, &vol)| self.map.angle(i).map(|angle| (angle, vol)))
            .fold((0.0f32, 0.0f32), |(sum, total), (angle, vol)| {
                (sum + angle * vol, total + vol)
            });

        if weight > 0.0 {
            weighted / weight
        } else {
            0.0
        }
    }
}
