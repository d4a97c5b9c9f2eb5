//! CLI configuration
//!
//! Optional TOML file tuning the plot style and the GPU scene. Every field
//! falls back to its default, so a partial file is fine.

use crate::error::{CliError, CliResult};
use physviz_gpu::{CanvasStyle, SceneConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub canvas: CanvasStyle,
    pub scene: SceneConfig,
}

impl RenderConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CliError::FileNotFound { path: path.to_path_buf() });
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load from the given path, or fall back to defaults when none given.
    pub fn load_or_default(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn example_toml() -> CliResult<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_example_round_trips() {
        let example = RenderConfig::example_toml().unwrap();
        let parsed: RenderConfig = toml::from_str(&example).unwrap();
        assert_eq!(parsed.canvas.samples, physviz_gpu::DEFAULT_SAMPLES);
        assert_eq!(parsed.scene.particles, SceneConfig::default().particles);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: RenderConfig = toml::from_str("[canvas]\ncurve = \"#ff0000\"\n").unwrap();
        assert_eq!(parsed.canvas.curve, "#ff0000");
        assert_eq!(parsed.canvas.background, CanvasStyle::default().background);
        assert_eq!(parsed.scene.seed, SceneConfig::default().seed);
    }

    #[test]
    fn test_load_missing_file_is_reported() {
        let err = RenderConfig::load("definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, CliError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scene]\nparticles = 64").unwrap();
        let config = RenderConfig::load(file.path()).unwrap();
        assert_eq!(config.scene.particles, 64);
    }
}
