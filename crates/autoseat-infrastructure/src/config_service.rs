//! Configuration service implementation.
//!
//! Builds an [`AgentConfig`] from, in increasing precedence:
//!
//! 1. the TOML file (`--config`, else `$AUTOSEAT_CONFIG`, else
//!    `~/.config/autoseat/config.toml`); a missing default file is fine,
//! 2. `AUTOSEAT_*` environment variables,
//! 3. overrides applied by the caller (CLI flags) before [`AgentConfig::validate`].

use autoseat_core::config::TransportMode;
use autoseat_core::{AgentConfig, AutoseatError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "AUTOSEAT_CONFIG";

const APP_DIR: &str = "autoseat";
const CONFIG_FILE: &str = "config.toml";

/// Loads the run configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    /// Path given on the command line, if any
    explicit_path: Option<PathBuf>,
}

impl ConfigService {
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Default location: `<config dir>/autoseat/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads file + process environment. Validation is left to the caller.
    pub fn load(&self) -> Result<AgentConfig> {
        self.load_with(|key| std::env::var(key).ok())
    }

    /// Loads file + the environment seen through `lookup`.
    pub fn load_with<F>(&self, lookup: F) -> Result<AgentConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.resolve_path(&lookup) {
            Some((path, required)) => Self::read_file(&path, required)?,
            None => AgentConfig::default(),
        };
        apply_env_overrides(&mut config, &lookup)?;
        Ok(config)
    }

    /// The file to read and whether it must exist.
    fn resolve_path<F>(&self, lookup: &F) -> Option<(PathBuf, bool)>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.explicit_path {
            return Some((path.clone(), true));
        }
        if let Some(path) = lookup(CONFIG_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            return Some((PathBuf::from(path), true));
        }
        Self::default_path().map(|path| (path, false))
    }

    fn read_file(path: &Path, required: bool) -> Result<AgentConfig> {
        if !path.exists() {
            if required {
                return Err(AutoseatError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "No config file; using defaults and environment");
            return Ok(AgentConfig::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AutoseatError::io(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: AgentConfig = toml::from_str(&content).map_err(|e| {
            AutoseatError::config(format!("invalid config file {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Applies `AUTOSEAT_*` variables on top of `config`.
pub fn apply_env_overrides<F>(config: &mut AgentConfig, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("AUTOSEAT_BASE_URL") {
        config.base_url = v;
    }
    if let Some(v) = get("AUTOSEAT_MODE") {
        config.mode = TransportMode::from_str(&v)?;
    }
    if let Some(v) = get("AUTOSEAT_MAX_CALLS") {
        config.max_calls = parse_number("AUTOSEAT_MAX_CALLS", &v)?;
    }
    if let Some(v) = get("AUTOSEAT_USERNAME") {
        config.credentials.username = v;
    }
    if let Some(v) = get("AUTOSEAT_PASSWORD") {
        config.credentials.password = v;
    }
    if let Some(v) = get("AUTOSEAT_TRUSTED_DEVICE_COOKIE") {
        config.credentials.trusted_device_cookie = Some(v);
    }
    if let Some(v) = get("AUTOSEAT_CAMPAIGN_ID") {
        config.campaign.id = v;
    }
    if let Some(v) = get("AUTOSEAT_CAMPAIGN_NAME") {
        config.campaign.name = v;
    }
    if let Some(v) = get("AUTOSEAT_CALL_DURATION_SECS") {
        config.timing.call_duration_secs = parse_number("AUTOSEAT_CALL_DURATION_SECS", &v)?;
    }
    if let Some(v) = get("AUTOSEAT_POLL_INTERVAL_MS") {
        config.timing.poll_interval_ms = parse_number("AUTOSEAT_POLL_INTERVAL_MS", &v)?;
    }
    if let Some(v) = get("AUTOSEAT_DEVTOOLS_URL") {
        config.browser.devtools_url = v;
    }
    if let Some(v) = get("AUTOSEAT_CALL_LOG") {
        config.call_log.path = PathBuf::from(v);
    }
    Ok(())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AutoseatError::config(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_env_overrides_file() {
        let file = config_file(
            r#"
            base_url = "https://dialer.example.com"
            max_calls = 3

            [credentials]
            username = "from-file"
            password = "pw"

            [campaign]
            id = "77"
            "#,
        );
        let service = ConfigService::new(Some(file.path().to_path_buf()));

        let config = service
            .load_with(env(&[
                ("AUTOSEAT_USERNAME", "from-env"),
                ("AUTOSEAT_MODE", "browser"),
                ("AUTOSEAT_MAX_CALLS", "10"),
            ]))
            .unwrap();

        assert_eq!(config.credentials.username, "from-env");
        assert_eq!(config.credentials.password, "pw");
        assert_eq!(config.mode, TransportMode::Browser);
        assert_eq!(config.max_calls, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path_from_env() {
        let file = config_file("base_url = \"https://from-env-path.example.com\"\n");
        let path = file.path().to_string_lossy().to_string();
        let service = ConfigService::new(None);

        let config = service
            .load_with(env(&[(CONFIG_PATH_ENV, path.as_str())]))
            .unwrap();
        assert_eq!(config.base_url, "https://from-env-path.example.com");
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let service = ConfigService::new(Some(PathBuf::from("/nonexistent/autoseat.toml")));
        let err = service.load_with(env(&[])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let mut config = AgentConfig::default();
        let err = apply_env_overrides(&mut config, &env(&[("AUTOSEAT_MAX_CALLS", "many")]))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_env_only_config_validates() {
        let mut config = AgentConfig::default();
        apply_env_overrides(
            &mut config,
            &env(&[
                ("AUTOSEAT_BASE_URL", "https://dialer.example.com"),
                ("AUTOSEAT_USERNAME", "agent"),
                ("AUTOSEAT_PASSWORD", "secret"),
                ("AUTOSEAT_CAMPAIGN_ID", "77"),
            ]),
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }
}
