use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{Language, DEFAULT_HISTORY_CAPACITY};

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "kanadojo";
const APPLICATION: &str = "translation-session";

pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub translator: TranslatorSettings,
    pub history: HistorySettings,
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
    /// Overrides the database location under the platform data directory
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub default_source_lang: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            translator: TranslatorSettings::default(),
            history: HistorySettings::default(),
            preferences: UserPreferences::default(),
        }
    }
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
            user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            database_path: None,
        }
    }
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_source_lang: "en".to_string(),
        }
    }
}

fn project_dirs() -> AppResult<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or_else(|| AppError::Config("Failed to determine project directories".to_string()))
}

impl AppSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("settings.json"))
    }

    /// Load from the platform config directory, writing defaults on first run,
    /// then apply environment overrides.
    pub async fn load() -> AppResult<Self> {
        let path = Self::get_settings_path()?;
        let mut settings = Self::load_from(&path).await?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub async fn load_from(path: &Path) -> AppResult<Self> {
        if !fs::try_exists(path).await? {
            let settings = Self::default();
            settings.save_to(path).await?;
            tracing::info!(path = %path.display(), "wrote default settings");
            return Ok(settings);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Config(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse settings: {}", e)))
    }

    pub async fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize settings: {}", e)))?;

        fs::write(path, content)
            .await
            .map_err(|e| AppError::Config(format!("Failed to write settings file: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("TRANSLATOR_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.translator.endpoint = endpoint;
            }
        }
        if let Ok(db) = std::env::var("TRANSLATOR_HISTORY_DB") {
            if !db.trim().is_empty() {
                self.history.database_path = Some(PathBuf::from(db));
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.history.capacity == 0 {
            return Err(AppError::Config("history.capacity must be at least 1".to_string()));
        }
        if self.translator.timeout_secs == 0 {
            return Err(AppError::Config("translator.timeout_secs must be at least 1".to_string()));
        }
        self.default_source_language()?;
        Ok(())
    }

    pub fn default_source_language(&self) -> AppResult<Language> {
        Language::from_code(&self.preferences.default_source_lang).ok_or_else(|| {
            AppError::Config(format!(
                "Unsupported default_source_lang: {}",
                self.preferences.default_source_lang
            ))
        })
    }

    pub fn database_path(&self) -> AppResult<PathBuf> {
        match &self.history.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("translation_history.redb")),
        }
    }
}
