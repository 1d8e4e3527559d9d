//! Runtime configuration: defaults, optional `persona.toml`, then
//! `PERSONA_*` environment overrides.

use anyhow::Context;
use persona_pipeline::ModelPaths;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "persona.toml";

/// On-disk layout and tunables. CLI flags select the source and debug
/// mode; everything else lives here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing the three stage model artifacts.
    pub model_dir: PathBuf,
    /// Root of the labelled reference images (one subdirectory per
    /// identity).
    pub gallery_dir: PathBuf,
    /// V4L2 device path used with `--camera`.
    pub camera_device: String,
    /// Per-stage inference timeout, in milliseconds.
    pub stage_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            gallery_dir: PathBuf::from("images"),
            camera_device: "/dev/video0".to_string(),
            stage_timeout_ms: 1000,
        }
    }
}

impl Config {
    /// Load from the explicit path if given, else from `./persona.toml`
    /// if present, else defaults. Environment overrides apply last.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PERSONA_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PERSONA_GALLERY_DIR") {
            self.gallery_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PERSONA_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Ok(v) = std::env::var("PERSONA_STAGE_TIMEOUT_MS") {
            match v.parse() {
                Ok(ms) => self.stage_timeout_ms = ms,
                Err(_) => tracing::warn!(value = %v, "ignoring bad PERSONA_STAGE_TIMEOUT_MS"),
            }
        }
    }

    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            face: self.model_dir.join("face-detection-retail-0004.onnx"),
            landmark: self.model_dir.join("landmarks-regression-retail-0009.onnx"),
            reid: self.model_dir.join("face-reidentification-retail-0095.onnx"),
        }
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }
}
