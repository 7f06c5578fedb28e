use std::path::PathBuf;

use dirs::home_dir;
use log::error;

const DEFAULT_MAP_LAYER_NAME: &str = "Layer";
const DEFAULT_FEATURE_LAYER_NAME: &str = "Drawing layer";

/// Registry configuration: where the config file lives and which
/// placeholder names replace blank layer names.
///
/// Merged from the `MAPBOARD_CONFIG` environment variable, a `config.json`
/// in the config directory, and built-in defaults, in that precedence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MapboardConfig {
  pub config_path: Option<PathBuf>,
  pub default_map_layer_name: Option<String>,
  pub default_feature_layer_name: Option<String>,
}

impl MapboardConfig {
  /// Loads and merges env, file, and default configuration. Seeds the
  /// config file on first run.
  #[must_use]
  pub fn new() -> Self {
    let from_env = Self::from_env();
    let from_file = Self::from_file();
    let default = Self::default();

    let mut merged = from_env;
    if let Some(from_file) = &from_file {
      merged = merged.merge(from_file);
    }
    merged = merged.merge(&default);

    if merged.config_path.is_some() && from_file.is_none() {
      merged.init_cfg_file();
    }

    merged
  }

  /// Placeholder used when a map layer is registered with a blank name.
  #[must_use]
  pub fn map_layer_placeholder(&self) -> &str {
    self
      .default_map_layer_name
      .as_deref()
      .unwrap_or(DEFAULT_MAP_LAYER_NAME)
  }

  /// Placeholder used when a feature layer is registered with a blank name.
  #[must_use]
  pub fn feature_layer_placeholder(&self) -> &str {
    self
      .default_feature_layer_name
      .as_deref()
      .unwrap_or(DEFAULT_FEATURE_LAYER_NAME)
  }

  fn from_env() -> Self {
    let config_path = std::env::var("MAPBOARD_CONFIG").ok().map(PathBuf::from);
    let default_map_layer_name = std::env::var("MAPBOARD_MAP_LAYER_NAME").ok();
    let default_feature_layer_name = std::env::var("MAPBOARD_FEATURE_LAYER_NAME").ok();

    Self {
      config_path,
      default_map_layer_name,
      default_feature_layer_name,
    }
  }

  fn merge(mut self, other: &Self) -> Self {
    self.config_path = self.config_path.or(other.config_path.clone());
    self.default_map_layer_name = self
      .default_map_layer_name
      .or(other.default_map_layer_name.clone());
    self.default_feature_layer_name = self
      .default_feature_layer_name
      .or(other.default_feature_layer_name.clone());
    self
  }

  fn from_file() -> Option<Self> {
    let config_path = std::env::var("MAPBOARD_CONFIG")
      .ok()
      .map(PathBuf::from)
      .or_else(|| home_dir().map(|p| p.join(".config").join("mapboard")))?;
    let config_path = config_path.join("config.json");

    serde_json::from_str(&std::fs::read_to_string(&config_path).ok()?)
      .inspect_err(|e| error!("Failed to read config file: {e}"))
      .ok()?
  }

  fn init_cfg_file(&self) {
    if let Some(path) = &self.config_path {
      if !path.exists() {
        let _ = std::fs::create_dir_all(path).inspect_err(|e| {
          error!("Failed to create config directory: {e}");
        });
      }

      let path = path.join("config.json");
      if !path.exists() {
        let config = serde_json::to_string_pretty(self);
        if let Ok(config) = config {
          let _ = std::fs::write(path, config).inspect_err(|e| {
            error!("Failed to write config file: {e}");
          });
        } else {
          error!("Failed to serialize config");
        }
      }
    }
  }
}

impl Default for MapboardConfig {
  fn default() -> Self {
    Self {
      config_path: home_dir().map(|p| p.join(".config").join("mapboard")),
      default_map_layer_name: None,
      default_feature_layer_name: None,
    }
  }
}
