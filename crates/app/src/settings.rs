//! Application settings, read from `settings.toml` in the working
//! directory. Every key has a default, so the file is optional.

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("spendbook.db".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: Database,
    pub log_level: String,
    /// Whether an Admin may act on groups they are not a member of.
    pub admin_group_override: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: Database::default(),
            log_level: "info".to_string(),
            admin_group_override: true,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .build()?;

        settings.try_deserialize()
    }

    pub fn database_url(&self) -> String {
        match &self.database {
            Database::Memory => "sqlite::memory:".to_string(),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}
