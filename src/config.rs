use crate::error::ConfigError;
use figment::Figment;
use figment::providers::Env;
use figment::providers::Format;
use figment::providers::Json;
use figment::providers::Serialized;
use serde::Deserialize;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Keys accepted by `kaprese config set`.
pub const SETTABLE_KEYS: &[&str] = &["docker_host", "output_path", "mount_subpath"];

/// Fully resolved process configuration.
///
/// Constructed once at startup and passed by reference to the entity store
/// and the runner. Changing the config directory means constructing a new
/// `Config`, not mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  /// Directory holding the entity store and `config.json`
  /// (default `~/.kaprese`).
  pub config_path: PathBuf,
  /// Docker daemon address (e.g. `unix:///var/run/docker.sock`); `None`
  /// means the local platform default.
  pub docker_host: Option<String>,
  /// Host directory receiving per-run outputs
  /// (`{output_path}/{engine}/{benchmark}`).
  pub output_path: PathBuf,
  /// Subpath appended to a benchmark's workdir for the in-container mount.
  pub mount_subpath: String,
}

fn default_config_path() -> PathBuf {
  match env::var_os("HOME") {
    Some(home) => PathBuf::from(home).join(".kaprese"),
    None => PathBuf::from(".kaprese"),
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      config_path: default_config_path(),
      docker_host: None,
      output_path: PathBuf::from("kaprese-output"),
      mount_subpath: "kaprese-output".to_string(),
    }
  }
}

impl Config {
  /// Resolves the configuration: built-in defaults, then
  /// `{config_path}/config.json`, then `KAPRESE_*` env overrides.
  ///
  /// The config directory itself comes from `override_path` (the CLI flag)
  /// or `KAPRESE_CONFIG_PATH`, falling back to `~/.kaprese`.
  pub fn load(override_path: Option<PathBuf>) -> Result<Self, ConfigError> {
    let config_path = override_path
      .or_else(|| env::var_os("KAPRESE_CONFIG_PATH").map(PathBuf::from))
      .unwrap_or_else(default_config_path);

    let defaults = Self {
      config_path: config_path.clone(),
      ..Self::default()
    };

    let config = Figment::from(Serialized::defaults(defaults))
      .merge(Json::file(config_path.join("config.json")))
      .merge(Env::prefixed("KAPRESE_").only(SETTABLE_KEYS))
      .extract()
      .map_err(Box::new)?;

    Ok(config)
  }

  /// Path of the persisted config file.
  pub fn config_file(&self) -> PathBuf {
    self.config_path.join("config.json")
  }

  /// Persists one settable key to `{config_path}/config.json`, keeping the
  /// other stored keys intact.
  pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
    if !SETTABLE_KEYS.contains(&key) {
      return Err(ConfigError::InvalidKey {
        key: key.to_string(),
      });
    }

    let path = self.config_file();
    let mut stored: serde_json::Map<String, serde_json::Value> = if path.exists() {
      let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadConfig {
        path: path.clone(),
        source,
      })?;
      serde_json::from_str(&content).map_err(|source| ConfigError::ParseConfig {
        path: path.clone(),
        source,
      })?
    } else {
      serde_json::Map::new()
    };

    stored.insert(
      key.to_string(),
      serde_json::Value::String(value.to_string()),
    );

    fs::create_dir_all(&self.config_path).map_err(|source| ConfigError::WriteConfig {
      path: self.config_path.clone(),
      source,
    })?;
    let content =
      serde_json::to_string_pretty(&stored).map_err(|source| ConfigError::ParseConfig {
        path: path.clone(),
        source,
      })?;
    fs::write(&path, content).map_err(|source| ConfigError::WriteConfig { path, source })?;

    tracing::info!("Set configuration key '{}'", key);
    Ok(())
  }

  /// Key/value/description rows for `kaprese config show`.
  pub fn entries(&self) -> Vec<(&'static str, String, &'static str)> {
    vec![
      (
        "config_path",
        self.config_path.display().to_string(),
        "path to kaprese config directory (default=~/.kaprese)",
      ),
      (
        "docker_host",
        self
          .docker_host
          .clone()
          .unwrap_or_else(|| "<platform default>".to_string()),
        "docker daemon address",
      ),
      (
        "output_path",
        self.output_path.display().to_string(),
        "host directory for per-run outputs",
      ),
      (
        "mount_subpath",
        self.mount_subpath.clone(),
        "mount subpath inside the benchmark workdir",
      ),
    ]
  }
}
