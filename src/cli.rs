use clap::Parser;
use std::path::PathBuf;

use soundradar::report::ReportFormat;

#[derive(Parser, Debug)]
#[command(name = "soundradar", about = "Estimates the direction a sound arrives from, frame by frame")]
pub struct Cli {
    /// Input audio files (WAV, FLAC, MP3, OGG), stereo or 7.1
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file (defaults to soundradar.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Samples per channel in each analysis frame
    #[arg(long, default_value_t = 1024)]
    pub frame_size: usize,

    /// Total loudness below which a frame is treated as silence
    #[arg(long, default_value_t = 0.01)]
    pub threshold: f32,

    /// Number of estimates averaged by the smoother
    #[arg(long, default_value_t = 5)]
    pub history: usize,

    /// Weight of the time-difference cue (stereo)
    #[arg(long, default_value_t = 0.7)]
    pub itd_weight: f32,

    /// Weight of the level-difference cue (stereo)
    #[arg(long, default_value_t = 0.3)]
    pub ild_weight: f32,

    /// Maximum interaural delay in seconds (stereo)
    #[arg(long, default_value_t = 8e-4)]
    pub max_itd: f32,

    /// Use the level difference only, skipping the correlation term
    #[arg(long)]
    pub level_only: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Write reports to this file instead of stdout (single input only)
    #[arg(short, long, conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// Write one report file per input into this directory, processing inputs in parallel
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Stop each input after this many seconds of audio
    #[arg(long)]
    pub max_seconds: Option<f32>,
}
