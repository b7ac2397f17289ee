use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::source::FrameSource;
use super::AudioFrame;

/// Streams fixed-size multichannel frames out of an audio file.
///
/// Channels are kept separate. A trailing block shorter than the frame size
/// is dropped when the file ends.
pub struct FileFrameSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_rate: u32,
    frame_size: usize,
    /// Decoded samples not yet handed out, one queue per channel
    pending: Vec<Vec<f32>>,
    finished: bool,
}

impl FileFrameSource {
    pub fn open(path: &Path, frame_size: usize) -> Result<Self> {
        if frame_size == 0 {
            anyhow::bail!("Frame size must be at least one sample");
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .context("Failed to probe audio format")?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .context("No audio tracks found")?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count());
        let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        log::info!(
            "Opened {}: {} channels, {}Hz, {} samples per frame",
            path.display(),
            channels,
            sample_rate,
            frame_size
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            channels,
            sample_rate,
            frame_size,
            pending: vec![Vec::new(); channels],
            finished: false,
        })
    }

    /// Decodes the next packet of our track into `pending`. Returns false at end of stream.
    fn decode_packet(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                    log::warn!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();

            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            deinterleave_into(&mut self.pending, sample_buf.samples(), spec.channels.count())?;
            return Ok(true);
        }
    }
}

/// Appends interleaved `samples` with `channels` channels to the per-channel queues.
///
/// A packet whose layout differs from the stream's is an error rather than
/// being split on the wrong stride.
fn deinterleave_into(pending: &mut [Vec<f32>], samples: &[f32], channels: usize) -> Result<()> {
    if channels != pending.len() {
        anyhow::bail!(
            "Decoded packet has {} channels, stream was opened with {}",
            channels,
            pending.len()
        );
    }
    for frame_samples in samples.chunks_exact(channels) {
        for (queue, &s) in pending.iter_mut().zip(frame_samples) {
            queue.push(s);
        }
    }
    Ok(())
}

impl FrameSource for FileFrameSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        while !self.finished && self.pending[0].len() < self.frame_size {
            if !self.decode_packet()? {
                self.finished = true;
            }
        }

        if self.pending[0].len() < self.frame_size {
            if !self.pending[0].is_empty() {
                log::debug!("Dropping {} trailing samples per channel", self.pending[0].len());
                self.pending.iter_mut().for_each(Vec::clear);
            }
            return Ok(None);
        }

        let channels = self
            .pending
            .iter_mut()
            .map(|queue| queue.drain(..self.frame_size).collect())
            .collect();

        Ok(Some(AudioFrame::new(channels, self.sample_rate)?))
    }
}
