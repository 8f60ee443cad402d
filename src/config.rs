use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::analysis::{SyntheticSource, Tone};
use crate::texture::{TextureLayout, MAX_FREQUENCY_BIN};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub texture: TextureConfig,
    pub driver: DriverConfig,
    pub source: SourceConfig,
}

/// Texture shape. Fixed once a builder is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub layout: TextureLayout,
    /// First visualised bin (inclusive), `0..255`.
    pub min_frequency_bin: i32,
    /// Last visualised bin (exclusive), `1..=255`.
    pub max_frequency_bin: i32,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            layout: TextureLayout::Row,
            min_frequency_bin: 0,
            max_frequency_bin: MAX_FREQUENCY_BIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Ticks per second.
    pub fps: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { fps: 60 }
    }
}

/// Parameters for the built-in test-signal analyser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub tones: Vec<Tone>,
    pub noise_floor: f32,
    /// Fail every Nth fetch (0 = never).
    pub dropout_every: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tones: vec![
                Tone::new(12.0, 0.9),
                Tone {
                    bin: 64.0,
                    amplitude: 0.6,
                    drift: 0.5,
                },
                Tone::new(180.0, 0.3),
            ],
            noise_floor: 0.02,
            dropout_every: 0,
        }
    }
}

impl SourceConfig {
    pub fn build(&self) -> SyntheticSource {
        SyntheticSource::new(self.tones.clone(), self.noise_floor)
            .with_dropout_every(self.dropout_every)
    }
}

/// Values supplied on the command line; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub layout: Option<TextureLayout>,
    pub min_frequency_bin: Option<i32>,
    pub max_frequency_bin: Option<i32>,
    pub fps: Option<u32>,
    pub dropout_every: Option<u32>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/spectex/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("spectex").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists.
    /// Returns None if the file is missing or fails to parse.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return None;
        }
        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(
                    "Failed to parse config at {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Write the commented template to the default path, returning the path.
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Self::generate_config_template())?;

        Ok(path)
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r#"# Spectex Configuration

[texture]
# Layout: "row" (2-row strip), "matrix-fft" or "matrix-wave" (256-row history).
# "matrix-both" is reserved and rejected.
layout = "row"
# Visualised frequency bins [min, max), 0 <= min < max <= 255
min_frequency_bin = 0
max_frequency_bin = 255

[driver]
# Rebuild ticks per second (1-240)
fps = 60

[source]
# Built-in test signal. Magnitude floor added to every bin (0.0-1.0)
noise_floor = 0.02
# Report a failed fetch every N fetches (0 = never)
dropout_every = 0

[[source.tones]]
bin = 12.0
amplitude = 0.9

[[source.tones]]
bin = 64.0
amplitude = 0.6
# Bins moved per frame
drift = 0.5

[[source.tones]]
bin = 180.0
amplitude = 0.3
"#
        .to_string()
    }

    /// Apply command-line values on top of the loaded config.
    pub fn merge_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(layout) = overrides.layout {
            self.texture.layout = layout;
        }
        if let Some(min) = overrides.min_frequency_bin {
            self.texture.min_frequency_bin = min;
        }
        if let Some(max) = overrides.max_frequency_bin {
            self.texture.max_frequency_bin = max;
        }
        if let Some(fps) = overrides.fps {
            self.driver.fps = fps;
        }
        if let Some(n) = overrides.dropout_every {
            self.source.dropout_every = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_matches_defaults() {
        let parsed: Config = toml::from_str(&Config::generate_config_template()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [texture]
            layout = "matrix-wave"
            max_frequency_bin = 128
            "#,
        )
        .unwrap();

        assert_eq!(parsed.texture.layout, TextureLayout::MatrixWave);
        assert_eq!(parsed.texture.min_frequency_bin, 0);
        assert_eq!(parsed.texture.max_frequency_bin, 128);
        assert_eq!(parsed.driver, DriverConfig::default());
        assert_eq!(parsed.source, SourceConfig::default());
    }

    #[test]
    fn unknown_layout_is_a_parse_error() {
        assert!(toml::from_str::<Config>("[texture]\nlayout = \"diagonal\"\n").is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = Config::default();
        config.merge_overrides(&ConfigOverrides {
            layout: Some(TextureLayout::MatrixFft),
            min_frequency_bin: Some(4),
            fps: Some(30),
            ..Default::default()
        });

        assert_eq!(config.texture.layout, TextureLayout::MatrixFft);
        assert_eq!(config.texture.min_frequency_bin, 4);
        assert_eq!(config.texture.max_frequency_bin, MAX_FREQUENCY_BIN);
        assert_eq!(config.driver.fps, 30);
        assert_eq!(config.source.dropout_every, 0);
    }
}
