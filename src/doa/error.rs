use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DoaError {
    /// An estimator was handed a frame with the wrong number of channels.
    #[error("estimator expects {expected} channels, frame has {actual}")]
    InvalidChannelConfiguration { expected: usize, actual: usize },

    /// No estimator exists for this channel count (only 2 and 8 are handled).
    #[error("no estimator for {0} channels (supported: 2 stereo, 8 surround)")]
    UnsupportedChannelConfiguration(usize),

    #[error("frame source failed")]
    UpstreamCaptureFailure(#[source] BoxError),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A channel direction in a surround map is NaN or infinite.
    #[error("channel {channel} has no finite direction ({angle})")]
    InvalidAngleMap { channel: usize, angle: f32 },
}

impl DoaError {
    /// Frames failing with this error can be skipped; everything else ends the session.
    pub fn is_skippable(&self) -> bool {
        matches!(self, DoaError::UnsupportedChannelConfiguration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn upstream_failure_keeps_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device unplugged");
        let err = DoaError::UpstreamCaptureFailure(Box::new(inner));
        let source = err.source().expect("source should be preserved");
        assert_eq!(source.to_string(), "device unplugged");
    }

    #[test]
    fn only_unsupported_is_skippable() {
        assert!(DoaError::UnsupportedChannelConfiguration(3).is_skippable());
        assert!(!DoaError::InvalidChannelConfiguration { expected: 2, actual: 3 }.is_skippable());
        assert!(!DoaError::MalformedFrame("empty".into()).is_skippable());
        assert!(!DoaError::InvalidAngleMap { channel: 0, angle: f32::NAN }.is_skippable());
    }
}
