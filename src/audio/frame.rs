use crate::doa::DoaError;

/// One block of planar multichannel samples, amplitude-normalized to [-1, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, DoaError> {
        if sample_rate == 0 {
            return Err(DoaError::MalformedFrame("sample rate is zero".into()));
        }
        let len = match channels.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => return Err(DoaError::MalformedFrame("frame has no samples".into())),
            None => return Err(DoaError::MalformedFrame("frame has no channels".into())),
        };
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != len) {
            return Err(DoaError::MalformedFrame(format!(
                "channel {} has {} samples, expected {}",
                idx,
                ch.len(),
                len
            )));
        }
        Ok(Self { channels, sample_rate })
    }

    /// Splits interleaved samples (`L R L R ...`) into planar channels.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Result<Self, DoaError> {
        if channels == 0 || samples.len() % channels != 0 {
            return Err(DoaError::MalformedFrame(format!(
                "{} interleaved samples do not split into {} channels",
                samples.len(),
                channels
            )));
        }
        let frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for chunk in samples.chunks(channels) {
            for (ch, &s) in planar.iter_mut().zip(chunk) {
                ch.push(s);
            }
        }
        Self::new(planar, sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel(&self, idx: usize) -> &[f32] {
        &self.channels[idx]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Duration covered by this frame, in seconds.
    pub fn duration(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }
}

/// Mean absolute amplitude per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Loudness(Vec<f32>);

impl Loudness {
    pub fn per_channel(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> f32 {
        self.0[idx]
    }

    /// Sum of the per-channel values, for stereo and surround alike.
    pub fn total(&self) -> f32 {
        self.0.iter().sum()
    }
}

/// Subtracts each channel's mean, leaving a frame of the same shape.
pub fn remove_dc(frame: &AudioFrame) -> AudioFrame {
    let channels = frame
        .channels
        .iter()
        .map(|ch| {
            let mean = ch.iter().sum::<f32>() / ch.len() as f32;
            ch.iter().map(|&s| s - mean).collect()
        })
        .collect();

    AudioFrame {
        channels,
        sample_rate: frame.sample_rate,
    }
}

pub fn channel_loudness(frame: &AudioFrame) -> Loudness {
    Loudness(
        frame
            .channels
            .iter()
            .map(|ch| ch.iter().map(|s| s.abs()).sum::<f32>() / ch.len() as f32)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_channels() {
        let err = AudioFrame::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert!(matches!(err, DoaError::MalformedFrame(_)));
    }

    #[test]
    fn rejects_empty_and_zero_rate() {
        assert!(AudioFrame::new(vec![], 44100).is_err());
        assert!(AudioFrame::new(vec![vec![]], 44100).is_err());
        assert!(AudioFrame::new(vec![vec![0.0]], 0).is_err());
    }

    #[test]
    fn deinterleaves() {
        let frame = AudioFrame::from_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 2, 48000).unwrap();
        assert_eq!(frame.channel_count(), 2);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(frame.channel(1), &[-1.0, -2.0, -3.0]);
        assert!(AudioFrame::from_interleaved(&[1.0, 2.0, 3.0], 2, 48000).is_err());
    }

    #[test]
    fn dc_removal_zeroes_channel_means() {
        let frame = AudioFrame::new(vec![vec![0.5, 0.7, 0.3, 0.5], vec![-0.2; 4]], 44100).unwrap();
        let clean = remove_dc(&frame);
        assert_eq!(clean.channel_count(), 2);
        assert_eq!(clean.len(), 4);
        for ch in clean.channels() {
            let mean: f32 = ch.iter().sum::<f32>() / ch.len() as f32;
            assert!(mean.abs() < 1e-6);
        }
        assert!(clean.channel(1).iter().all(|s| s.abs() < 1e-6));
        assert!((clean.channel(0)[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn loudness_is_mean_absolute_and_total_sums() {
        let frame = AudioFrame::new(vec![vec![0.5, -0.5, 0.5, -0.5], vec![0.1, -0.3, 0.1, -0.3]], 44100).unwrap();
        let loudness = channel_loudness(&frame);
        assert!((loudness.get(0) - 0.5).abs() < 1e-6);
        assert!((loudness.get(1) - 0.2).abs() < 1e-6);
        assert!((loudness.total() - 0.7).abs() < 1e-6);
    }
}
