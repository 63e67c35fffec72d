use crate::asset::{Category, DirectoryPool};
use crate::audio::AudioFormat;
use crate::export::ExportSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "affmix.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryDirs {
    pub intro: String,
    pub outro: String,
    pub main: String,
    pub background: String,
}

impl Default for CategoryDirs {
    fn default() -> Self {
        CategoryDirs {
            intro: "intro".to_string(),
            outro: "outro".to_string(),
            main: "main".to_string(),
            background: "background".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings { port: 8000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerConfig {
    #[serde(default = "default_assets_root")]
    pub assets_root: PathBuf,
    #[serde(default)]
    pub dirs: CategoryDirs,
    /// File extensions counted as assets (case-insensitive).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Peak normalization target below full scale, in dB.
    #[serde(default = "default_headroom_db")]
    pub headroom_db: f64,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("audio_files")
}

fn default_extensions() -> Vec<String> {
    vec!["mp3".to_string()]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_sample_rate() -> u32 {
    AudioFormat::CD_STEREO.sample_rate
}

fn default_channels() -> u16 {
    AudioFormat::CD_STEREO.channels
}

fn default_headroom_db() -> f64 {
    0.1
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            assets_root: default_assets_root(),
            dirs: CategoryDirs::default(),
            extensions: default_extensions(),
            output_dir: default_output_dir(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            headroom_db: default_headroom_db(),
            export: ExportSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl MixerConfig {
    /// Load from JSON. A missing file yields the defaults; an unreadable or
    /// corrupt one is an error rather than a silent reset.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(MixerConfig::default());
        }
        let data = fs::read_to_string(path)
            .map_err(|e| format!("Could not read '{}': {}", path.display(), e))?;
        let config: MixerConfig = serde_json::from_str(&data)
            .map_err(|e| format!("Corrupt config '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| format!("Serialize error: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Write error: {}", e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample_rate must be greater than 0".to_string());
        }
        if self.channels == 0 {
            return Err("channels must be greater than 0".to_string());
        }
        if self.extensions.is_empty() {
            return Err("at least one asset extension is required".to_string());
        }
        if self.headroom_db < 0.0 {
            return Err("headroom_db must be >= 0".to_string());
        }
        Ok(())
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        let name = match category {
            Category::Intro => &self.dirs.intro,
            Category::Outro => &self.dirs.outro,
            Category::Main => &self.dirs.main,
            Category::Background => &self.dirs.background,
        };
        self.assets_root.join(name)
    }

    pub fn pool(&self) -> DirectoryPool {
        let dirs: HashMap<Category, PathBuf> = Category::ALL
            .iter()
            .map(|c| (*c, self.category_dir(*c)))
            .collect();
        DirectoryPool::with_dirs(dirs, &self.extensions)
    }
}
