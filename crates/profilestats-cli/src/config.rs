use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use profilestats_core::languages::LanguageSettings;
use profilestats_core::StatsChartSettings;
use serde::Deserialize;

const LOCAL_CONFIG_FILE: &str = "profilestats.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub stats: StatsChartSettings,
    pub languages: LanguageSettings,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub ledger: PathBuf,
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ledger: PathBuf::from("history.json"),
            output: PathBuf::from("assets"),
        }
    }
}

impl ProfileConfig {
    fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config").join("profilestats").join("config.toml"))
    }

    /// `profilestats.toml` in the working directory, then the per-user file.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        Self::user_config_path().filter(|path| path.is_file())
    }

    /// An explicit path must exist; without one, a missing file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Configured language colors extend the built-in ones instead of replacing them.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: ProfileConfig = toml::from_str(content)?;

        let mut colors = LanguageSettings::default().colors;
        colors.extend(
            config
                .languages
                .colors
                .drain()
                .map(|(name, color)| (name.to_lowercase(), color)),
        );
        config.languages.colors = colors;

        Ok(config)
    }
}
