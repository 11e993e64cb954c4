use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ApiError, Result};

/// Environment variable that overrides the configured API base URL.
pub const BASE_URL_ENV: &str = "BACKDESK_API_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub list: ListConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL all resource paths are resolved against.
  pub base_url: String,
  /// Client-side path the shell navigates to when the session expires.
  #[serde(default = "default_login_path")]
  pub login_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a successful fetch is considered stale.
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  /// Seconds an unobserved entry may idle before garbage collection.
  #[serde(default = "default_gc_secs")]
  pub gc_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
  /// Quiet period before a staged search term is committed.
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
  /// Minimum committed-term length sent to the server, where a page
  /// opts into the gate. Empty terms always pass.
  #[serde(default = "default_min_search_len")]
  pub min_search_len: usize,
  /// Page counts up to this value render without ellipses.
  #[serde(default = "default_window_threshold")]
  pub window_threshold: u32,
  /// Selectable page sizes.
  #[serde(default = "default_page_sizes")]
  pub page_sizes: Vec<u32>,
  #[serde(default = "default_page_size")]
  pub default_page_size: u32,
}

fn default_login_path() -> String {
  "/login".to_string()
}

fn default_stale_secs() -> u64 {
  60
}

fn default_gc_secs() -> u64 {
  300
}

fn default_debounce_ms() -> u64 {
  800
}

fn default_min_search_len() -> usize {
  3
}

fn default_window_threshold() -> u32 {
  6
}

fn default_page_sizes() -> Vec<u32> {
  vec![5, 10, 15, 18]
}

fn default_page_size() -> u32 {
  10
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
      gc_secs: default_gc_secs(),
    }
  }
}

impl Default for ListConfig {
  fn default() -> Self {
    Self {
      debounce_ms: default_debounce_ms(),
      min_search_len: default_min_search_len(),
      window_threshold: default_window_threshold(),
      page_sizes: default_page_sizes(),
      default_page_size: default_page_size(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./backdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/backdesk/config.yaml
  ///
  /// `BACKDESK_API_URL` overrides the file's base URL when set.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(ApiError::Config(format!(
          "Config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(ApiError::Config(
          "No configuration file found. Create one at ~/.config/backdesk/config.yaml \
           or set BACKDESK_API_URL."
            .to_string(),
        ))
      }
    };

    config.apply_env();
    Ok(config)
  }

  /// Build a configuration from the environment alone, with every
  /// tunable at its default. Requires `BACKDESK_API_URL` to be set.
  pub fn from_env() -> Result<Self> {
    let base_url = std::env::var(BASE_URL_ENV)
      .map_err(|_| ApiError::Config(format!("{} is not set", BASE_URL_ENV)))?;

    Ok(Self {
      api: ApiConfig {
        base_url,
        login_path: default_login_path(),
      },
      cache: CacheConfig::default(),
      list: ListConfig::default(),
    })
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("backdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("backdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| ApiError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    serde_yaml::from_str(&contents)
      .map_err(|e| ApiError::Config(format!("Failed to parse config file {}: {}", path.display(), e)))
  }

  fn apply_env(&mut self) {
    if let Ok(url) = std::env::var(BASE_URL_ENV) {
      self.api.base_url = url;
    }
  }

  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.cache.stale_secs)
  }

  pub fn gc_time(&self) -> Duration {
    Duration::from_secs(self.cache.gc_secs)
  }

  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.list.debounce_ms)
  }
}
