use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// ---------------------------------------------------------------------------
// NutrivedaConfig
// ---------------------------------------------------------------------------

/// Application configuration stored at `~/.nutriveda/config.json`.
///
/// Only host settings live here. Patient data, diet plans and the export
/// history are never written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutrivedaConfig {
    // Export
    /// Directory the desktop host saves downloads into. `None` means
    /// `~/.nutriveda/exports`.
    pub export_dir: Option<PathBuf>,
    /// How long a generated artifact stays downloadable from history.
    pub retention_secs: u64,
    /// Maximum number of entries kept in the export history.
    pub history_limit: usize,
    /// Pause between simulated progress ticks of an export job.
    pub progress_step_delay_ms: u64,
    /// `"pdf"` or `"spreadsheet"`.
    pub default_format: String,
    pub default_template: String,

    // Prescription upload simulation
    pub upload_tick_ms: u64,
    pub upload_step_percent: u8,

    // Clinic branding
    pub clinic_name: String,
    pub clinic_contact: Option<String>,
    pub practitioner: Option<String>,

    // General
    pub log_level: String,
}

impl Default for NutrivedaConfig {
    fn default() -> Self {
        Self {
            export_dir: None,
            retention_secs: 300,
            history_limit: 50,
            progress_step_delay_ms: 120,
            default_format: "pdf".into(),
            default_template: "comprehensive".into(),
            upload_tick_ms: 150,
            upload_step_percent: 10,
            clinic_name: "NutriVeda Clinic".into(),
            clinic_contact: None,
            practitioner: None,
            log_level: "info".into(),
        }
    }
}

impl NutrivedaConfig {
    /// Returns the base config directory: `~/.nutriveda/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".nutriveda"))
    }

    /// Returns the config file path: `~/.nutriveda/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.nutriveda/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Resolved export directory (configured value or `~/.nutriveda/exports/`).
    pub fn resolved_export_dir(&self) -> Result<PathBuf> {
        match &self.export_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::base_dir()?.join("exports")),
        }
    }

    /// Ensures the base and logs directories exist.
    pub fn ensure_dirs() -> Result<()> {
        let dirs = [Self::base_dir()?, Self::logs_dir()?];
        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from disk, or creates default if missing.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load config from a specific file path, writing defaults when absent.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            config.validate()?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Rejects values the export pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.retention_secs == 0 {
            anyhow::bail!("retention_secs must be greater than zero");
        }
        if self.history_limit == 0 {
            anyhow::bail!("history_limit must be greater than zero");
        }
        if self.upload_step_percent == 0 || self.upload_step_percent > 100 {
            anyhow::bail!(
                "upload_step_percent must be within 1..=100, got {}",
                self.upload_step_percent
            );
        }
        if self.clinic_name.trim().is_empty() {
            anyhow::bail!("clinic_name must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NutrivedaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention_secs, 300);
        assert_eq!(config.default_format, "pdf");
    }

    #[test]
    fn load_from_missing_path_writes_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        let config = NutrivedaConfig::load_from_path(&path).unwrap();
        assert_eq!(config, NutrivedaConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn save_and_reload_preserves_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = NutrivedaConfig::default();
        config.clinic_name = "Ayur Wellness".into();
        config.retention_secs = 60;
        config.export_dir = Some(tmp.path().join("out"));
        config.save_to_path(&path).unwrap();

        let loaded = NutrivedaConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "history_limit": 5 }"#).unwrap();

        let loaded = NutrivedaConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.history_limit, 5);
        assert_eq!(loaded.retention_secs, 300);
    }

    #[test]
    fn zero_retention_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "retention_secs": 0 }"#).unwrap();

        let err = NutrivedaConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("retention_secs"));
    }

    #[test]
    fn malformed_json_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = NutrivedaConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn explicit_export_dir_wins() {
        let mut config = NutrivedaConfig::default();
        config.export_dir = Some(PathBuf::from("/tmp/exports"));
        assert_eq!(
            config.resolved_export_dir().unwrap(),
            PathBuf::from("/tmp/exports")
        );
    }
}
