use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::combine::Combine;
use crate::dirs::{system_config_file, user_skein_config_dir};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared source directories searched after the challenge directory
    pub src: Vec<PathBuf>,

    /// File name of the entry script inside a challenge directory
    #[serde(rename = "entry-file-name")]
    pub entry_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src: Vec::new(),
            entry_file_name: "main.py".to_owned(),
        }
    }
}

impl Combine for Config {
    fn combine(self, other: Self) -> Self {
        Self {
            // For collections, higher precedence (self) completely replaces
            // lower precedence (other) when self has non-default values
            src: if !self.src.is_empty() { self.src } else { other.src },
            // For scalars, self wins unless it still carries the default
            entry_file_name: if self.entry_file_name != Config::default().entry_file_name {
                self.entry_file_name
            } else {
                other.entry_file_name
            },
        }
    }
}

/// Configuration values from environment variables with SKEIN_ prefix
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub src: Option<Vec<PathBuf>>,
    pub entry_file_name: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables with SKEIN_ prefix
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // SKEIN_SRC - comma-separated list of shared source directories
        if let Ok(src_str) = env::var("SKEIN_SRC") {
            let paths: Vec<PathBuf> = src_str
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if !paths.is_empty() {
                config.src = Some(paths);
            }
        }

        // SKEIN_ENTRY_FILE_NAME - entry script file name
        if let Ok(name) = env::var("SKEIN_ENTRY_FILE_NAME") {
            let name = name.trim();
            if !name.is_empty() {
                config.entry_file_name = Some(name.to_owned());
            }
        }

        config
    }

    /// Apply environment config to base config
    pub fn apply_to(self, mut config: Config) -> Config {
        if let Some(src) = self.src {
            config.src = src;
        }
        if let Some(entry_file_name) = self.entry_file_name {
            config.entry_file_name = entry_file_name;
        }
        config
    }
}

impl Config {
    /// Load a single config file from a path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    fn try_load_and_combine<P: AsRef<Path>>(
        config: &mut Config,
        path: P,
        context: &str,
    ) -> Result<()> {
        if path.as_ref().exists() {
            log::debug!("Loading {} from: {:?}", context, path.as_ref());
            let loaded = Self::load_from_file(&path)
                .with_context(|| format!("Failed to load {} from {:?}", context, path.as_ref()))?;
            *config = loaded.combine(config.clone());
        }
        Ok(())
    }

    /// Load configuration with hierarchical precedence:
    /// 1. CLI-provided config path (highest precedence)
    /// 2. Environment variables (SKEIN_*)
    /// 3. Project config (skein.toml in current directory)
    /// 4. User config (~/.config/skein/skein.toml)
    /// 5. System config (/etc/skein/skein.toml or equivalent)
    /// 6. Default values (lowest precedence)
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        // 1. Load system config (lowest precedence)
        if let Some(system_config_path) = system_config_file() {
            Self::try_load_and_combine(&mut config, &system_config_path, "system config")?;
        }

        // 2. Load user config
        if let Some(user_config_dir) = user_skein_config_dir() {
            let user_config_path = user_config_dir.join("skein.toml");
            Self::try_load_and_combine(&mut config, &user_config_path, "user config")?;
        }

        // 3. Load project config (skein.toml in current directory)
        let project_config_path = PathBuf::from("skein.toml");
        Self::try_load_and_combine(&mut config, &project_config_path, "project config")?;

        // 4. Apply environment variables
        let env_config = EnvConfig::from_env();
        config = env_config.apply_to(config);

        // 5. Load CLI-provided config (highest precedence)
        if let Some(cli_config_path) = cli_config_path {
            Self::try_load_and_combine(&mut config, cli_config_path, "CLI config")?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_entry_file_name_is_main_py() {
        let config = Config::default();
        assert_eq!(config.entry_file_name, "main.py");
        assert!(config.src.is_empty());
    }

    #[test]
    fn combine_prefers_non_default_values_from_self() {
        let high = Config {
            src: vec![PathBuf::from("libs")],
            ..Default::default()
        };
        let low = Config {
            src: vec![PathBuf::from("shared")],
            entry_file_name: "solve.py".to_owned(),
        };
        let combined = high.combine(low);
        assert_eq!(combined.src, vec![PathBuf::from("libs")]);
        assert_eq!(combined.entry_file_name, "solve.py");
    }

    #[test]
    fn toml_uses_kebab_case_key_for_entry_file_name() {
        let config: Config =
            toml::from_str("src = [\"challengelibs\"]\nentry-file-name = \"solution.py\"")
                .expect("valid toml");
        assert_eq!(config.src, vec![PathBuf::from("challengelibs")]);
        assert_eq!(config.entry_file_name, "solution.py");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config: Config = toml::from_str("future-knob = true").expect("valid toml");
        assert_eq!(config.entry_file_name, "main.py");
    }
}
