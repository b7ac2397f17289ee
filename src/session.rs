use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::source::FrameSource;
use crate::doa::{DoaError, Engine};
use crate::report::FrameReport;

/// Token for cooperative cancellation of a running session.
///
/// Clones share the same flag; the session checks it between frames.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub silent_frames: usize,
    pub skipped_frames: usize,
    pub cancelled: bool,
}

/// Pulls frames from `source` until it ends or `cancel` fires, handing one
/// report per estimated frame to `on_frame`.
///
/// The source is consumed and dropped on every exit path. Frames the engine
/// has no estimator for are skipped; any other engine error, and every source
/// error, ends the session.
pub fn run<S, F>(mut source: S, engine: &mut Engine, cancel: &CancellationToken, mut on_frame: F) -> Result<RunSummary>
where
    S: FrameSource,
    F: FnMut(FrameReport) -> Result<()>,
{
    let mut summary = RunSummary::default();
    let mut index = 0usize;
    // Position is kept in whole samples so timestamps do not drift over long streams
    let mut position = 0u64;

    loop {
        if cancel.is_cancelled() {
            log::info!("Session cancelled after {} frames", index);
            summary.cancelled = true;
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => return Err(DoaError::UpstreamCaptureFailure(e.into()).into()),
        };

        let frame_time = (position as f64 / frame.sample_rate() as f64) as f32;
        position += frame.len() as u64;
        index += 1;

        let analysis = match engine.analyze(&frame) {
            Ok(analysis) => analysis,
            Err(e) if e.is_skippable() => {
                log::warn!("Skipping frame {}: {}", index - 1, e);
                summary.skipped_frames += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        summary.frames += 1;
        if analysis.silent {
            summary.silent_frames += 1;
        }

        let report = FrameReport::new(index - 1, frame_time, &analysis);
        log::debug!("{}", report.to_text());
        on_frame(report)?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFrame;
    use crate::doa::EngineConfig;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    const RATE: u32 = 44100;

    struct MemorySource {
        frames: VecDeque<Result<AudioFrame>>,
        dropped: Rc<Cell<bool>>,
    }

    impl MemorySource {
        fn new(frames: Vec<Result<AudioFrame>>) -> (Self, Rc<Cell<bool>>) {
            let dropped = Rc::new(Cell::new(false));
            let source = Self {
                frames: frames.into(),
                dropped: dropped.clone(),
            };
            (source, dropped)
        }
    }

    impl FrameSource for MemorySource {
        fn channels(&self) -> usize {
            2
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
            self.frames.pop_front().transpose()
        }
    }

    impl Drop for MemorySource {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    fn tone(channels: usize, amplitude: f32) -> Result<AudioFrame> {
        let samples: Vec<f32> = (0..1024)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * i as f32 / 32.0).sin())
            .collect();
        Ok(AudioFrame::new(vec![samples; channels], RATE)?)
    }

    #[test]
    fn reports_every_frame_with_timestamps() {
        let (source, dropped) = MemorySource::new(vec![tone(2, 0.5), tone(2, 0.0), tone(2, 0.5)]);
        let mut engine = Engine::new(EngineConfig::default(), 2).unwrap();
        let mut reports = Vec::new();

        let summary = run(source, &mut engine, &CancellationToken::new(), |r| {
            reports.push(r);
            Ok(())
        })
        .unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.silent_frames, 1);
        assert!(!summary.cancelled);
        assert!(dropped.get());
        assert_eq!(reports.len(), 3);
        assert!(reports[1].silent);
        assert!((reports[2].time - 2048.0 / RATE as f32).abs() < 1e-6);
    }

    /// Endless silence in one-sample frames, stopping after `remaining` frames.
    struct SilentSource {
        remaining: usize,
    }

    impl FrameSource for SilentSource {
        fn channels(&self) -> usize {
            2
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(AudioFrame::new(vec![vec![0.0], vec![0.0]], RATE)?))
        }
    }

    #[test]
    fn timestamps_do_not_drift_on_long_streams() {
        let frames = 10 * RATE as usize;
        let source = SilentSource { remaining: frames };
        let mut engine = Engine::new(EngineConfig::default(), 2).unwrap();
        let mut last = None;

        let summary = run(source, &mut engine, &CancellationToken::new(), |r| {
            last = Some((r.index, r.time));
            Ok(())
        })
        .unwrap();

        assert_eq!(summary.frames, frames);
        let (index, time) = last.unwrap();
        let exact = index as f64 / RATE as f64;
        assert!((time as f64 - exact).abs() < 1e-5, "reported {} expected {}", time, exact);
    }

    #[test]
    fn skips_unsupported_frames() {
        let (source, _) = MemorySource::new(vec![tone(2, 0.5), tone(3, 0.5), tone(2, 0.5)]);
        let mut engine = Engine::new(EngineConfig::default(), 2).unwrap();
        let mut indices = Vec::new();

        let summary = run(source, &mut engine, &CancellationToken::new(), |r| {
            indices.push(r.index);
            Ok(())
        })
        .unwrap();

        assert_eq!(summary.skipped_frames, 1);
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(engine.smoother().len(), 2);
    }

    #[test]
    fn layout_mismatch_aborts() {
        let (source, dropped) = MemorySource::new(vec![tone(8, 0.5)]);
        let mut engine = Engine::new(EngineConfig::default(), 2).unwrap();

        let err = run(source, &mut engine, &CancellationToken::new(), |_| Ok(())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DoaError>(),
            Some(DoaError::InvalidChannelConfiguration { .. })
        ));
        assert!(dropped.get());
    }

    #[test]
    fn source_errors_propagate() {
        let (source, dropped) = MemorySource::new(vec![tone(2, 0.5), Err(anyhow::anyhow!("device lost"))]);
        let mut engine = Engine::new(EngineConfig::default(), 2).unwrap();

        let err = run(source, &mut engine, &CancellationToken::new(), |_| Ok(())).unwrap_err();
        let doa = err.downcast_ref::<DoaError>().expect("wrapped in DoaError");
        assert!(matches!(doa, DoaError::UpstreamCaptureFailure(_)));
        assert_eq!(std::error::Error::source(doa).unwrap().to_string(), "device lost");
        assert!(dropped.get());
    }

    #[test]
    fn cancellation_stops_between_frames() {
        let (source, dropped) = MemorySource::new(vec![tone(2, 0.5), tone(2, 0.5), tone(2, 0.5)]);
        let mut engine = Engine::new(EngineConfig::default(), 2).unwrap();
        let cancel = CancellationToken::new();
        let handle = cancel.clone();
        let mut seen = 0;

        let summary = run(source, &mut engine, &cancel, |_| {
            seen += 1;
            handle.cancel();
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, 1);
        assert!(summary.cancelled);
        assert!(dropped.get());
    }
}
