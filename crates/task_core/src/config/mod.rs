use crate::error::AppError;
use crate::model::canonical_key;
use crate::storage::StoreSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKMGR_CONFIG_PATH";
const APP_DIR: &str = "taskmgr";

pub const MONGODB_URI_ENV_VAR: &str = "MONGODB_URI";
pub const DB_NAME_ENV_VAR: &str = "DB_NAME";

pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "task_manager";
pub const DEFAULT_COLLECTION: &str = "tasks";

#[derive(Debug, Clone)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn accentize(&self, text: &str) -> String {
        if self.accent.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", self.accent, text, self.reset)
        }
    }

    pub fn mutedize(&self, text: &str) -> String {
        if self.muted.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", self.muted, text, self.reset)
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        palette_for_theme(None)
    }
}

pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    match theme.map(canonical_theme_name).as_deref() {
        Some("noir") => Palette {
            accent: "\x1b[38;5;208m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        Some("solarized") => Palette {
            accent: "\x1b[38;5;108m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        _ => Palette {
            accent: "",
            muted: "",
            reset: "",
        },
    }
}

pub fn canonical_theme_name(raw: &str) -> String {
    match canonical_key(raw).as_deref() {
        None | Some("vanilla") | Some("light") | Some("plain") => "default".to_string(),
        Some("dark") | Some("dark_mode") | Some("darkmode") => "noir".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Contents of the JSON config file. Unset fields fall back to the
/// environment and then to built-in defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub mongodb_uri: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub mongodb_uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
}

impl Config {
    /// Resolves connection settings, validating the URI scheme and names.
    pub fn store_settings(&self) -> Result<StoreSettings, AppError> {
        let uri = non_blank(self.mongodb_uri.as_deref()).unwrap_or(DEFAULT_MONGODB_URI);
        if !(uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")) {
            return Err(AppError::validation(
                "mongodb_uri must start with mongodb:// or mongodb+srv://",
            ));
        }

        let database = non_blank(self.database.as_deref()).unwrap_or(DEFAULT_DATABASE);
        let collection = non_blank(self.collection.as_deref()).unwrap_or(DEFAULT_COLLECTION);
        if database.contains(['/', '\\', '.', ' ', '"', '$']) {
            return Err(AppError::validation(format!(
                "database name '{database}' contains characters MongoDB does not allow"
            )));
        }
        if collection.contains('$') || collection.starts_with("system.") {
            return Err(AppError::validation(format!(
                "collection name '{collection}' is not allowed"
            )));
        }

        Ok(StoreSettings {
            uri: uri.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR).join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE_NAME))
    }
}

/// Never fails: a missing file yields defaults, an unreadable one yields
/// defaults plus the error so the caller can report it.
pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

pub fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

pub fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(normalize_config_theme(config))
}

fn normalize_config_theme(mut config: Config) -> Config {
    config.theme = config.theme.map(|name| canonical_theme_name(&name));
    config
}

/// Applies `MONGODB_URI` and `DB_NAME` from the process environment.
pub fn apply_env(base: &Config) -> Config {
    apply_env_with(base, |key| std::env::var(key).ok())
}

pub fn apply_env_with<F>(base: &Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = base.clone();
    if let Some(uri) = lookup(MONGODB_URI_ENV_VAR).filter(|value| !value.trim().is_empty()) {
        merged.mongodb_uri = Some(uri);
    }
    if let Some(database) = lookup(DB_NAME_ENV_VAR).filter(|value| !value.trim().is_empty()) {
        merged.database = Some(database);
    }
    merged
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(theme) = overrides.theme.as_ref() {
        merged.theme = Some(canonical_theme_name(theme));
    }
    if let Some(uri) = overrides.mongodb_uri.as_ref() {
        merged.mongodb_uri = Some(uri.clone());
    }
    if let Some(database) = overrides.database.as_ref() {
        merged.database = Some(database.clone());
    }
    if let Some(collection) = overrides.collection.as_ref() {
        merged.collection = Some(collection.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_MONGODB_URI,
        apply_env_with, canonical_theme_name, load_config_from_path,
        load_config_with_fallback_from_path, merge_overrides, palette_for_theme,
    };
    use std::fs;

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_with_fallback_from_path(&dir.path().join("missing.json"));

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.map(|err| err.code()), Some("invalid_data"));
    }

    #[test]
    fn load_config_reads_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let content = serde_json::json!({
            "theme": "Dark Mode",
            "mongodb_uri": "mongodb://db.internal:27017",
            "database": "work"
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();

        assert_eq!(loaded.theme.as_deref(), Some("noir"));
        assert_eq!(loaded.mongodb_uri.as_deref(), Some("mongodb://db.internal:27017"));
        assert_eq!(loaded.database.as_deref(), Some("work"));
        assert_eq!(loaded.collection, None);
    }

    #[test]
    fn defaults_resolve_to_local_server() {
        let settings = Config::default().store_settings().unwrap();

        assert_eq!(settings.uri, DEFAULT_MONGODB_URI);
        assert_eq!(settings.database, DEFAULT_DATABASE);
        assert_eq!(settings.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn store_settings_rejects_bad_values() {
        let bad_uri = Config {
            mongodb_uri: Some("postgres://localhost".into()),
            ..Config::default()
        };
        assert_eq!(bad_uri.store_settings().unwrap_err().code(), "validation");

        let bad_database = Config {
            database: Some("my.db".into()),
            ..Config::default()
        };
        assert_eq!(bad_database.store_settings().unwrap_err().code(), "validation");
    }

    #[test]
    fn environment_overrides_file_values() {
        let base = Config {
            mongodb_uri: Some("mongodb://file:27017".into()),
            database: Some("file_db".into()),
            ..Config::default()
        };

        let merged = apply_env_with(&base, |key| match key {
            "MONGODB_URI" => Some("mongodb://env:27017".to_string()),
            "DB_NAME" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(merged.mongodb_uri.as_deref(), Some("mongodb://env:27017"));
        assert_eq!(merged.database.as_deref(), Some("file_db"));
    }

    #[test]
    fn merge_overrides_wins_over_base() {
        let base = Config {
            theme: Some("default".into()),
            database: Some("file_db".into()),
            ..Config::default()
        };
        let overrides = ConfigOverrides {
            theme: Some("Solarized".into()),
            collection: Some("chores".into()),
            ..ConfigOverrides::default()
        };

        let merged = merge_overrides(&base, &overrides);

        assert_eq!(merged.theme.as_deref(), Some("solarized"));
        assert_eq!(merged.database.as_deref(), Some("file_db"));
        assert_eq!(merged.collection.as_deref(), Some("chores"));
        assert_eq!(base.collection, None);
    }

    #[test]
    fn merge_overrides_with_empty_overrides_returns_clone() {
        let base = Config {
            theme: Some("noir".into()),
            ..Config::default()
        };

        assert_eq!(merge_overrides(&base, &ConfigOverrides::default()), base);
    }

    #[test]
    fn canonical_theme_name_maps_variants() {
        assert_eq!(canonical_theme_name("Vanilla"), "default");
        assert_eq!(canonical_theme_name("dark-mode"), "noir");
        assert_eq!(canonical_theme_name("  "), "default");
        assert_eq!(canonical_theme_name("Solarized"), "solarized");
    }

    #[test]
    fn palette_for_theme_returns_palette() {
        assert!(palette_for_theme(Some("vanilla")).accent.is_empty());
        assert_eq!(palette_for_theme(Some("dark")).accent, "\x1b[38;5;208m");
        assert!(palette_for_theme(Some("oceanic")).accent.is_empty());
        assert_eq!(palette_for_theme(None).accentize("x"), "x");
    }
}
