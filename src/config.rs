use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Duration;
use url::Url;

use crate::errors::{AppError, AppResult};
use crate::routes::Routes;
use crate::uploader::credentials::{
    discover_credentials, BearerTokenHelper, HostCredentialHelper, HostGlobals, RequestBuilder,
    SessionCookies, DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER,
};
use crate::uploader::{ReqwestTransport, StickerClient};

pub const DEFAULT_PLUGIN_ID: &str = "com.example.sticker";
const CONFIG_DIR_NAME: &str = "Sticker Picker";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub plugin_id: String,
    pub request_timeout_secs: u64,
    pub csrf_cookie_name: String,
    pub csrf_header_name: String,
    /// Personal access token. When set it stands in for the host's
    /// credential helper.
    pub access_token: Option<String>,
    /// Raw `Cookie` header of a logged-in browser session.
    pub session_cookie: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8065".to_string(),
            plugin_id: DEFAULT_PLUGIN_ID.to_string(),
            request_timeout_secs: 120,
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            csrf_header_name: DEFAULT_CSRF_HEADER.to_string(),
            access_token: None,
            session_cookie: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn routes(&self) -> AppResult<Routes> {
        Routes::new(&self.server_url, &self.plugin_id)
    }

    /// Wires a reqwest-backed client with the credentials this config carries.
    pub fn build_client(&self) -> AppResult<StickerClient> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty());
        let globals = HostGlobals {
            namespaced: token
                .map(|t| Arc::new(BearerTokenHelper::new(t)) as Arc<dyn HostCredentialHelper>),
            legacy: None,
        };

        let provider = discover_credentials(
            &globals,
            Arc::new(SessionCookies::new(self.session_cookie.clone())),
            &self.csrf_cookie_name,
            &self.csrf_header_name,
        )?;

        let transport =
            ReqwestTransport::new(self.request_timeout(), self.session_cookie.clone())?;

        Ok(StickerClient::new(
            Arc::new(transport),
            RequestBuilder::new(provider),
            self.routes()?,
        ))
    }
}

pub fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join(CONFIG_DIR_NAME);

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_config() -> AppResult<Config> {
    load_config_from(&get_config_path()?)
}

pub fn load_config_from(config_path: &Path) -> AppResult<Config> {
    if config_path.exists() {
        let config_str = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_str).unwrap_or_else(|e| {
            log::warn!("Failed to parse config file: {}. Using defaults.", e);
            Config::default()
        });

        // Validate config before returning
        validate_config(&config)?;

        Ok(config)
    } else {
        // Create default config
        let default_config = Config::default();
        save_config_internal(config_path, &default_config)?;
        Ok(default_config)
    }
}

pub fn save_config_to(config_path: &Path, config: &Config) -> AppResult<()> {
    validate_config(config)?;
    save_config_internal(config_path, config)
}

fn save_config_internal(config_path: &Path, config: &Config) -> AppResult<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Create backup of existing config
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.bak");
        if let Err(e) = fs::copy(config_path, &backup_path) {
            log::warn!("Failed to create config backup: {}", e);
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(config_path, config_str)?;

    log::info!("Configuration saved successfully");
    Ok(())
}

pub fn validate_config(config: &Config) -> AppResult<()> {
    match Url::parse(&config.server_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(AppError::validation(
                "server_url",
                "Must be an absolute http or https URL",
            ))
        }
    }

    if config.plugin_id.trim().is_empty() {
        return Err(AppError::validation("plugin_id", "Must not be empty"));
    }

    if config.request_timeout_secs == 0 || config.request_timeout_secs > 300 {
        return Err(AppError::validation(
            "request_timeout_secs",
            "Must be between 1 and 300",
        ));
    }

    if config.csrf_cookie_name.trim().is_empty() {
        return Err(AppError::validation("csrf_cookie_name", "Must not be empty"));
    }

    if config.csrf_header_name.trim().is_empty() {
        return Err(AppError::validation("csrf_header_name", "Must not be empty"));
    }

    // Validate log level
    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(AppError::validation("log_level", "Must be a valid log level"));
    }

    Ok(())
}

// Reset configuration to defaults
pub fn reset_config() -> AppResult<()> {
    reset_config_at(&get_config_path()?)
}

pub fn reset_config_at(config_path: &Path) -> AppResult<()> {
    // Backup existing config
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.reset_backup");
        fs::copy(config_path, &backup_path)?;
        log::info!("Existing config backed up to {}", backup_path.display());
    }

    save_config_internal(config_path, &Config::default())?;

    log::info!("Configuration reset to defaults");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sticker_picker_config_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.plugin_id, "com.example.sticker");
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut Config)>)> = vec![
            ("server_url", Box::new(|c: &mut Config| c.server_url = "chat.example.com".to_string())),
            ("server_url", Box::new(|c: &mut Config| c.server_url = "ftp://chat.example.com".to_string())),
            ("plugin_id", Box::new(|c: &mut Config| c.plugin_id = " ".to_string())),
            ("request_timeout_secs", Box::new(|c: &mut Config| c.request_timeout_secs = 0)),
            ("request_timeout_secs", Box::new(|c: &mut Config| c.request_timeout_secs = 301)),
            ("csrf_header_name", Box::new(|c: &mut Config| c.csrf_header_name.clear())),
            ("log_level", Box::new(|c: &mut Config| c.log_level = "verbose".to_string())),
        ];

        for (field, mutate) in cases {
            let mut config = Config::default();
            mutate(&mut config);
            match validate_config(&config) {
                Err(AppError::Validation { field: actual, .. }) => assert_eq!(actual, field),
                other => panic!("expected {} to be rejected, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"server_url": "https://chat.example.com"}"#).unwrap();
        assert_eq!(config.server_url, "https://chat.example.com");
        assert_eq!(config.csrf_cookie_name, "MMCSRF");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_first_load_creates_file() {
        let dir = scratch_dir("first_load");
        let path = dir.join("config.json");

        let config = load_config_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_keeps_backup() {
        let dir = scratch_dir("backup");
        let path = dir.join("config.json");

        save_config_to(&path, &Config::default()).unwrap();

        let updated = Config {
            server_url: "https://chat.example.com".to_string(),
            ..Config::default()
        };
        save_config_to(&path, &updated).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), updated);
        let backup: Config =
            serde_json::from_str(&fs::read_to_string(path.with_extension("json.bak")).unwrap())
                .unwrap();
        assert_eq!(backup, Config::default());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_config_is_not_saved() {
        let dir = scratch_dir("invalid");
        let path = dir.join("config.json");

        let invalid = Config {
            plugin_id: String::new(),
            ..Config::default()
        };
        assert!(save_config_to(&path, &invalid).is_err());
        assert!(!path.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reset_restores_defaults_with_backup() {
        let dir = scratch_dir("reset");
        let path = dir.join("config.json");

        let custom = Config {
            server_url: "https://chat.example.com".to_string(),
            log_level: "debug".to_string(),
            ..Config::default()
        };
        save_config_to(&path, &custom).unwrap();

        reset_config_at(&path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), Config::default());
        let backup: Config = serde_json::from_str(
            &fs::read_to_string(path.with_extension("json.reset_backup")).unwrap(),
        )
        .unwrap();
        assert_eq!(backup, custom);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reset_without_existing_file() {
        let dir = scratch_dir("reset_fresh");
        let path = dir.join("config.json");

        reset_config_at(&path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), Config::default());
        assert!(!path.with_extension("json.reset_backup").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_build_client_from_config() {
        let config = Config {
            server_url: "https://chat.example.com".to_string(),
            access_token: Some("tok".to_string()),
            ..Config::default()
        };

        let client = config.build_client().unwrap();
        assert_eq!(
            client.routes().stickers(),
            "https://chat.example.com/plugins/com.example.sticker/api/v1/stickers"
        );
    }
}
