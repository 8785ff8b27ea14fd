use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::persist::DEFAULT_KEY;

const APP_DIR: &str = "plate-layout";

/// Editor settings, read from TOML. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub storage: StorageConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for `<key>.json`; the platform data dir when unset.
    pub dir: Option<PathBuf>,
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            key: DEFAULT_KEY.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".plate-layout")),
        }
    }
}

/// Fixed values written into the sequencer plate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub container_type: String,
    pub app_type: String,
    pub owner: String,
    pub operator: String,
    pub plate_sealing: String,
    pub scheduling_pref: String,
    pub results_group: String,
    pub instrument_protocol: String,
    pub analysis_protocol: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            container_type: "96-Well".into(),
            app_type: "Regular".into(),
            owner: "W".into(),
            operator: "W".into(),
            plate_sealing: "Septa".into(),
            scheduling_pref: "1234".into(),
            results_group: "ATANTARES".into(),
            instrument_protocol: "LONG".into(),
            analysis_protocol: "ATANTARES".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info` or `plate_core=debug`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

/// `<config dir>/plate-layout/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

impl EditorConfig {
    /// Load from `path`, or the default location when `None`.
    /// A missing file gives defaults; a broken one is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() -> anyhow::Result<()> {
        assert_eq!(EditorConfig::from_toml("")?, EditorConfig::default());
        Ok(())
    }

    #[test]
    fn partial_sections_keep_other_defaults() -> anyhow::Result<()> {
        let cfg = EditorConfig::from_toml(
            r#"
            [export]
            owner = "LAB"

            [storage]
            dir = "/tmp/plates"
            "#,
        )?;
        assert_eq!(cfg.export.owner, "LAB");
        assert_eq!(cfg.export.container_type, "96-Well");
        assert_eq!(cfg.storage.key, "reactions-storage");
        assert_eq!(cfg.storage.resolved_dir(), PathBuf::from("/tmp/plates"));
        assert_eq!(cfg.logging.filter, "info");
        Ok(())
    }

    #[test]
    fn missing_file_is_not_an_error() -> anyhow::Result<()> {
        let cfg = EditorConfig::load(Some(Path::new("/definitely/not/here.toml")))?;
        assert_eq!(cfg, EditorConfig::default());
        Ok(())
    }

    #[test]
    fn bad_toml_is_reported() {
        assert!(EditorConfig::from_toml("[export\nowner=").is_err());
    }
}
