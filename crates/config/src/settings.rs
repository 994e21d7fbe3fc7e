// Application settings
// Loaded from ~/.config/cardops/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides `database.path`.
pub const DB_PATH_ENV: &str = "CARDOPS_DB";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file. Empty = `<data dir>/cardops/cardops.db`
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    pub mis: String,
    pub campaign: String,
    pub update_log: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            mis: "HDFC_MIS_Data".to_string(),
            campaign: "Campaign_Data".to_string(),
            update_log: "MIS_Update_Log".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankSettings {
    /// Used in report names and mail subjects
    pub name: String,
    /// Campaign rows are limited to store slugs containing this
    pub store_filter: String,
}

impl Default for BankSettings {
    fn default() -> Self {
        Self {
            name: "HDFC".to_string(),
            store_filter: "hdfc".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleAdsSettings {
    /// Accepted lead_utm_source values (case-insensitive)
    pub utm_sources: Vec<String>,
}

impl Default for GoogleAdsSettings {
    fn default() -> Self {
        Self {
            utm_sources: ["ad_cc", "adword_cc", "hdcc_cc", "hdcc_cn"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Outgoing report mail. The password is never read from this file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// SMTP login; also the From address when `from` is empty
    pub username: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub signature: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.zoho.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            from: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            signature: "Reporting Team".to_string(),
        }
    }
}

impl MailSettings {
    pub fn effective_from(&self) -> &str {
        if self.from.is_empty() {
            &self.username
        } else {
            &self.from
        }
    }

    /// True when enough is set to attempt a send.
    pub fn is_configured(&self) -> bool {
        !self.smtp_host.is_empty() && !self.username.is_empty() && !self.to.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub tables: TableSettings,
    pub bank: BankSettings,
    pub google_ads: GoogleAdsSettings,
    pub mail: MailSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cardops")
            .join("settings.toml")
    }

    /// Default database location when none is configured.
    pub fn default_db_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cardops")
            .join("cardops.db")
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, String> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path` (missing file = defaults), then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| format!("Error reading {}: {}", path.display(), e))?;
            Self::from_toml(&contents).map_err(|e| format!("Error parsing {}: {}", path.display(), e))?
        } else {
            log::debug!("settings: {} not found, using defaults", path.display());
            Self::default()
        };
        settings.apply_env(|name| std::env::var(name).ok());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Apply overrides from a variable lookup (the process environment in practice).
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var(DB_PATH_ENV).filter(|p| !p.is_empty()) {
            log::debug!("settings: database path from {DB_PATH_ENV}");
            self.database.path = path;
        }
    }

    /// Configured database path, or the default one.
    pub fn db_path(&self) -> PathBuf {
        if self.database.path.is_empty() {
            Self::default_db_path()
        } else {
            PathBuf::from(&self.database.path)
        }
    }

    /// Save current settings to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, text).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let s = Settings::from_toml(
            r#"
[bank]
name = "ICICI"

[mail]
username = "reports@example.com"
to = ["ops@example.com"]
"#,
        )
        .unwrap();
        assert_eq!(s.bank.name, "ICICI");
        assert_eq!(s.bank.store_filter, "hdfc");
        assert_eq!(s.tables.mis, "HDFC_MIS_Data");
        assert_eq!(s.mail.smtp_port, 587);
        assert_eq!(s.mail.effective_from(), "reports@example.com");
        assert!(s.mail.is_configured());
        assert_eq!(s.google_ads.utm_sources.len(), 4);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(Settings::from_toml("[mail\nsmtp_port = 1").is_err());
        assert!(Settings::from_toml("[mail]\nsmtp_port = \"x\"").is_err());
    }

    #[test]
    fn env_overrides_database_path() {
        let mut s = Settings::default();
        s.apply_env(|name| (name == DB_PATH_ENV).then(|| "/tmp/x.db".to_string()));
        assert_eq!(s.db_path(), PathBuf::from("/tmp/x.db"));

        let mut s = Settings::default();
        s.apply_env(|_| Some(String::new()));
        assert_eq!(s.db_path(), Settings::default_db_path());
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(s.tables, TableSettings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardops/settings.toml");
        let mut s = Settings::default();
        s.mail.cc = vec!["a@example.com".into(), "b@example.com".into()];
        s.save_to(&path).unwrap();

        let mut loaded = Settings::from_toml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        loaded.apply_env(|_| None);
        assert_eq!(loaded, s);
    }
}
