//! Direction-of-arrival estimation for stereo and 7.1 audio streams.
//!
//! Frames are pulled from a [`audio::source::FrameSource`], reduced to a
//! single smoothed angle per frame by a [`doa::Engine`], and turned into
//! [`report::FrameReport`]s by the [`session`] loop. Angles are in degrees:
//! 0 straight ahead, positive to the left, negative to the right.

pub mod audio;
pub mod config;
pub mod doa;
pub mod report;
pub mod session;
