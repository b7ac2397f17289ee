use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::doa::stereo::StereoConfig;
use crate::report::ReportFormat;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub stereo: StereoConfig,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
    #[serde(default = "default_history")]
    pub history: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub format: ReportFormat,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            silence_threshold: default_silence_threshold(),
            history: default_history(),
        }
    }
}

fn default_frame_size() -> usize { 1024 }
fn default_silence_threshold() -> f32 { crate::doa::DEFAULT_SILENCE_THRESHOLD }
fn default_history() -> usize { crate::doa::smoother::DEFAULT_HISTORY }

/// `soundradar.toml` in the working directory, then the per-user config locations.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("soundradar.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("soundradar").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("soundradar").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::debug!("Config parse error in {}: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soundradar.toml");
        std::fs::write(
            &path,
            "[engine]\nsilence_threshold = 0.05\n\n[stereo]\nitd_weight = 0.5\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.engine.silence_threshold, 0.05);
        assert_eq!(cfg.engine.frame_size, 1024);
        assert_eq!(cfg.engine.history, 5);
        assert_eq!(cfg.stereo.itd_weight, 0.5);
        assert_eq!(cfg.stereo.ild_weight, 0.3);
        assert_eq!(cfg.stereo.max_itd, 8e-4);
        assert_eq!(cfg.output.format, ReportFormat::Json);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.engine.frame_size, 1024);
        assert_eq!(cfg.stereo, StereoConfig::default());
        assert_eq!(cfg.output.format, ReportFormat::Text);
    }

    #[test]
    fn unreadable_or_invalid_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("missing.toml")).is_none());

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[engine\nframe_size = ").unwrap();
        assert!(load_config(&path).is_none());
    }
}
