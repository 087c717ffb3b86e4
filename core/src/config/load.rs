use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AppConfig;

pub const LOCAL_CONFIG_FILE: &str = "scriptbridge.toml";

/// Load configuration.
///
/// An explicit path must exist. Without one, `./scriptbridge.toml` and then
/// `~/.scriptbridge/config.toml` are tried before falling back to defaults.
pub fn load(explicit: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut cfg = match explicit {
        Some(raw) => {
            let path = expand_path(raw);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            read_file(&path)?
        }
        None => match default_candidates().into_iter().find(|p| p.exists()) {
            Some(path) => read_file(&path)?,
            None => AppConfig::default(),
        },
    };

    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn default_candidates() -> Vec<PathBuf> {
    let mut out = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(home) = dirs::home_dir() {
        out.push(home.join(".scriptbridge").join("config.toml"));
    }
    out
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let shown = path.display().to_string();
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: shown.clone(),
        source,
    })?;
    let cfg = toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;
    tracing::debug!(target: "scriptbridge.config", path = %shown, "config loaded");
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("SCRIPTBRIDGE_PYTHON") {
        if !v.trim().is_empty() {
            cfg.interpreter.path = v;
        }
    }
    if let Ok(v) = std::env::var("SCRIPTBRIDGE_RULES") {
        if !v.trim().is_empty() {
            cfg.rules.path = Some(v);
        }
    }
    if let Ok(v) = std::env::var("SCRIPTBRIDGE_LOG_DIR") {
        if !v.trim().is_empty() {
            cfg.logging.dir = Some(v);
        }
    }
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.interpreter.path.trim().is_empty() {
        return Err(ConfigError::Validation("interpreter.path is empty".into()));
    }
    if cfg.events_out.channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "events_out.channel_capacity must be greater than zero".into(),
        ));
    }
    for (field, delim) in [
        ("interpreter.stdout_delimiter", &cfg.interpreter.stdout_delimiter),
        ("interpreter.stderr_delimiter", &cfg.interpreter.stderr_delimiter),
    ] {
        if matches!(delim, Some(d) if d.is_empty()) {
            return Err(ConfigError::Validation(format!("{field} must not be empty")));
        }
    }
    if encoding_rs::Encoding::for_label(cfg.interpreter.encoding.as_bytes()).is_none() {
        return Err(ConfigError::Validation(format!(
            "unknown interpreter.encoding: {}",
            cfg.interpreter.encoding
        )));
    }
    Ok(())
}
