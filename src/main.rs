mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

use cli::Cli;
use soundradar::audio::decode::FileFrameSource;
use soundradar::audio::source::FrameSource;
use soundradar::config;
use soundradar::doa::stereo::StereoConfig;
use soundradar::doa::{Engine, EngineConfig};
use soundradar::report::{self, ReportFormat, ReportWriter};
use soundradar::session::{self, CancellationToken, RunSummary};

/// Everything a single input needs, shared read-only across worker threads.
struct RunSettings {
    engine: EngineConfig,
    frame_size: usize,
    format: ReportFormat,
    max_seconds: Option<f32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect soundradar.toml / global config
    let config_path = cli.config.clone().or_else(config::find_config);
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.frame_size == 1024 { cli.frame_size = cfg.engine.frame_size; }
            if cli.threshold == 0.01 { cli.threshold = cfg.engine.silence_threshold; }
            if cli.history == 5 { cli.history = cfg.engine.history; }
            if cli.itd_weight == 0.7 { cli.itd_weight = cfg.stereo.itd_weight; }
            if cli.ild_weight == 0.3 { cli.ild_weight = cfg.stereo.ild_weight; }
            if cli.max_itd == 8e-4 { cli.max_itd = cfg.stereo.max_itd; }
            if cli.format == ReportFormat::Text { cli.format = cfg.output.format; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    for input in &cli.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }
    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output takes a single input; use --output-dir for several");
    }

    let stereo = if cli.level_only {
        StereoConfig {
            max_itd: cli.max_itd,
            ..StereoConfig::level_only()
        }
    } else {
        StereoConfig {
            itd_weight: cli.itd_weight,
            ild_weight: cli.ild_weight,
            max_itd: cli.max_itd,
        }
    };

    let settings = RunSettings {
        engine: EngineConfig {
            silence_threshold: cli.threshold,
            history: cli.history,
            stereo,
            ..EngineConfig::default()
        },
        frame_size: cli.frame_size,
        format: cli.format,
        max_seconds: cli.max_seconds,
    };

    log::info!("soundradar - direction of arrival estimation");
    log::info!(
        "Frame size: {}, silence threshold: {}, history: {}",
        settings.frame_size, settings.engine.silence_threshold, settings.engine.history
    );
    log::info!(
        "Stereo weights: itd={:.2} ild={:.2}, max itd={:.1}us",
        settings.engine.stereo.itd_weight,
        settings.engine.stereo.ild_weight,
        settings.engine.stereo.max_itd * 1e6
    );

    if let Some(ref dir) = cli.output_dir {
        return run_batch(&cli.inputs, dir, &settings);
    }

    for input in &cli.inputs {
        let summary = if let Some(ref output) = cli.output {
            let file = std::fs::File::create(output)
                .with_context(|| format!("Failed to create output file: {}", output.display()))?;
            let summary = process_input(input, &settings, std::io::BufWriter::new(file), None)?;
            log::info!("Reports written to {}", output.display());
            summary
        } else {
            process_input(input, &settings, std::io::stdout().lock(), None)?
        };
        log_summary(input, &summary);
    }

    Ok(())
}

/// Processes every input in parallel, one engine and one report file each.
fn run_batch(inputs: &[PathBuf], dir: &Path, settings: &RunSettings) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    // Resolved up front so parallel workers never share an output file
    let out_paths = report::report_paths(inputs, dir, settings.format)?;

    let multi = MultiProgress::new();
    let style = ProgressStyle::default_spinner()
        .template("[{elapsed_precise}] {spinner} {pos} frames  {msg}")
        .context("Invalid progress template")?;

    let results: Vec<(PathBuf, Result<RunSummary>)> = inputs
        .par_iter()
        .zip(out_paths.par_iter())
        .map(|(input, out_path)| {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(style.clone());
            pb.set_message(input.display().to_string());

            let result = std::fs::File::create(out_path)
                .with_context(|| format!("Failed to create output file: {}", out_path.display()))
                .and_then(|file| process_input(input, settings, std::io::BufWriter::new(file), Some(&pb)));

            pb.finish_with_message(format!("{} done", input.display()));
            (input.clone(), result)
        })
        .collect();

    let mut failures = 0;
    for (input, result) in &results {
        match result {
            Ok(summary) => log_summary(input, summary),
            Err(err) => {
                failures += 1;
                log::error!("{}: {:#}", input.display(), err);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} inputs failed", failures, results.len());
    }
    log::info!("Done! Reports in {}", dir.display());
    Ok(())
}

fn process_input<W: Write>(
    input: &Path,
    settings: &RunSettings,
    out: W,
    progress: Option<&ProgressBar>,
) -> Result<RunSummary> {
    let source = FileFrameSource::open(input, settings.frame_size)?;
    let mut engine = Engine::new(settings.engine, source.channels())
        .with_context(|| format!("Cannot estimate direction for {}", input.display()))?;
    log::info!("{}: {} mode", input.display(), engine.mode().name());

    let cancel = CancellationToken::new();
    let sample_rate = source.sample_rate();
    let mut writer = ReportWriter::new(out, settings.format);

    let summary = session::run(source, &mut engine, &cancel, |report| {
        writer.write(&report)?;
        if let Some(pb) = progress {
            pb.inc(1);
        }
        if let Some(limit) = settings.max_seconds {
            if reached_limit(report.index + 1, settings.frame_size, sample_rate, limit) {
                cancel.cancel();
            }
        }
        Ok(())
    })?;

    writer.finish()?;
    Ok(summary)
}

/// Whether `frames_done` frames cover at least `limit` seconds, counted in samples.
fn reached_limit(frames_done: usize, frame_size: usize, sample_rate: u32, limit: f32) -> bool {
    frames_done as f64 * frame_size as f64 >= limit as f64 * sample_rate as f64
}

fn log_summary(input: &Path, summary: &RunSummary) {
    log::info!(
        "{}: {} frames ({} silent, {} skipped){}",
        input.display(),
        summary.frames,
        summary.silent_frames,
        summary.skipped_frames,
        if summary.cancelled { ", stopped early" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_exact_on_long_runs() {
        assert!(!reached_limit(440_999, 1, 44100, 10.0));
        assert!(reached_limit(441_000, 1, 44100, 10.0));

        // 430 frames of 1024 fall short of 10 s at 44.1 kHz, 431 do not
        assert!(!reached_limit(430, 1024, 44100, 10.0));
        assert!(reached_limit(431, 1024, 44100, 10.0));
    }
}
