use anyhow::Result;

use super::AudioFrame;

/// Pull-based supplier of fixed-size frames.
///
/// `next_frame` blocks until a frame is available and returns `Ok(None)` once
/// the stream has ended. Errors belong to the source and are passed upward
/// untouched.
pub trait FrameSource {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn next_frame(&mut self) -> Result<Option<AudioFrame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        (**self).next_frame()
    }
}
