use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::doa::Analysis;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Center,
}

impl Direction {
    /// Positive lag means the right channel hears the sound later.
    pub fn from_lag(lag_samples: isize) -> Self {
        match lag_samples {
            l if l > 0 => Direction::Left,
            l if l < 0 => Direction::Right,
            _ => Direction::Center,
        }
    }

    pub fn from_angle(angle: f32) -> Self {
        if angle > 0.0 {
            Direction::Left
        } else if angle < 0.0 {
            Direction::Right
        } else {
            Direction::Center
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Left => "Left",
            Direction::Right => "Right",
            Direction::Center => "Center",
        }
    }
}

/// Position of an angle on a unit radar: 0 deg at the top, positive angles to the left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RadarPoint {
    pub x: f32,
    pub y: f32,
}

impl RadarPoint {
    pub fn from_angle(angle: f32) -> Self {
        let (sin, cos) = angle.to_radians().sin_cos();
        Self { x: -sin, y: cos }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub index: usize,
    /// Start of the frame, in seconds from the start of the stream
    pub time: f32,
    pub angle: f32,
    pub raw_angle: Option<f32>,
    pub loudness: f32,
    pub lag_samples: Option<isize>,
    pub direction: Direction,
    pub radar: RadarPoint,
    pub silent: bool,
}

impl FrameReport {
    pub fn new(index: usize, time: f32, analysis: &Analysis) -> Self {
        let direction = if analysis.silent {
            Direction::Center
        } else {
            match analysis.lag_samples {
                Some(lag) => Direction::from_lag(lag),
                None => Direction::from_angle(analysis.angle),
            }
        };

        Self {
            index,
            time,
            angle: analysis.angle,
            raw_angle: analysis.raw_angle,
            loudness: analysis.loudness,
            lag_samples: analysis.lag_samples,
            direction,
            radar: RadarPoint::from_angle(analysis.angle),
            silent: analysis.silent,
        }
    }

    pub fn to_text(&self) -> String {
        let mut line = format!(
            "[{:>9.3}s] angle {:>+7.2} deg  {}",
            self.time,
            self.angle,
            self.direction.label()
        );
        if self.silent {
            line.push_str("  (silent)");
        }
        line
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "jsonl",
        }
    }
}

/// One report file per input inside `dir`, named after the input's file stem.
///
/// Inputs sharing a stem (`a/take.wav`, `b/take.flac`) get their position in
/// `inputs` appended (`take-0.txt`, `take-1.txt`) so no two inputs write the
/// same file.
pub fn report_paths(inputs: &[PathBuf], dir: &Path, format: ReportFormat) -> Result<Vec<PathBuf>> {
    let stems = inputs
        .iter()
        .map(|input| {
            input
                .file_stem()
                .and_then(|s| s.to_str())
                .with_context(|| format!("Input has no usable file name: {}", input.display()))
        })
        .collect::<Result<Vec<&str>>>()?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(*stem).or_default() += 1;
    }

    let mut seen = HashSet::new();
    let mut paths = Vec::with_capacity(inputs.len());
    for (idx, stem) in stems.iter().enumerate() {
        let name = if counts[stem] > 1 {
            format!("{}-{}.{}", stem, idx, format.extension())
        } else {
            format!("{}.{}", stem, format.extension())
        };
        let path = dir.join(name);
        if !seen.insert(path.clone()) {
            anyhow::bail!(
                "Report file {} would be written by more than one input",
                path.display()
            );
        }
        paths.push(path);
    }
    Ok(paths)
}

/// Writes one line per frame report.
pub struct ReportWriter<W: Write> {
    out: W,
    format: ReportFormat,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self { out, format }
    }

    pub fn write(&mut self, report: &FrameReport) -> Result<()> {
        match self.format {
            ReportFormat::Text => writeln!(self.out, "{}", report.to_text())?,
            ReportFormat::Json => {
                serde_json::to_writer(&mut self.out, report).context("Failed to serialize frame report")?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush().context("Failed to flush report output")?;
        Ok(self.out)
    }
}
