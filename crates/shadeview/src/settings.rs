use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use serde::Deserialize;

pub const ENV_CONFIG_DIR: &str = "SHADEVIEW_CONFIG_DIR";
pub const CONFIG_FILE: &str = "config.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "shadeview";
const APPLICATION: &str = "shadeview";

/// Optional defaults read from `config.toml`; command-line flags win.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Window size as `WIDTHxHEIGHT`.
    pub size: Option<String>,
    pub scale: Option<f32>,
    pub zoom_step: Option<f32>,
    /// `discard` or `keep-last-good`.
    pub reload_policy: Option<String>,
}

impl Settings {
    /// Reads the settings file.
    ///
    /// An explicit path must exist. The default location is optional and a
    /// missing file there yields empty settings.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_path(&path),
            Some(path) => {
                tracing::debug!(path = %path.display(), "no settings file; using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings = Self::from_toml(&text)
            .with_context(|| format!("failed to parse settings file {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?settings, "loaded settings");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// `$SHADEVIEW_CONFIG_DIR/config.toml`, else the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(ENV_CONFIG_DIR).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(dir).join(CONFIG_FILE));
    }
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_field() {
        let settings = Settings::from_toml(
            r#"
size = "640x480"
scale = 2.0
zoom_step = 0.5
reload_policy = "keep-last-good"
"#,
        )
        .unwrap();
        assert_eq!(settings.size.as_deref(), Some("640x480"));
        assert_eq!(settings.scale, Some(2.0));
        assert_eq!(settings.zoom_step, Some(0.5));
        assert_eq!(settings.reload_policy.as_deref(), Some("keep-last-good"));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_toml("colour = \"red\"").is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let error = Settings::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(error.to_string().contains("missing.toml"));
    }

    #[test]
    fn reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "scale = 3.0\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.scale, Some(3.0));
    }
}
