use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, info};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::clients::{ApiConfig, Credentials};
use crate::stores::{DEFAULT_IMAGE_ENGINE, DEFAULT_SPEECH_ENGINE, DEFAULT_VISION_ENGINE};

/// Environment variable overriding the engine root URL
pub const BASE_URL_VAR: &str = "MODEL_STUDIO_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "http://localhost:9090/Monolith";

const CONFIG_DIR: &str = "model-studio";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config file {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize config value: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
}

impl ConfigError {
    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Write { path, .. } => {
                format!("Could not access the settings file at {}.", path.display())
            }
            ConfigError::Parse { path, .. } => {
                format!("The settings file at {} is corrupted.", path.display())
            }
            ConfigError::Serialize(_) => "Could not save the settings.".to_string(),
            ConfigError::NoConfigDir => "No settings directory is available.".to_string(),
        }
    }
}

/// Type-safe configuration key that associates a key name with its value type
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T> {
    name: &'static str,
    _phantom: PhantomData<T>,
}

impl<T> ConfigKey<T> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    pub fn key_name(&self) -> &'static str {
        self.name
    }
}

// ===== Engine Configuration =====

/// Engine ids of the four studio models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelEngines {
    pub vision: String,
    pub speech: String,
    pub image: String,
    /// No hosted default; the engine picks its own speech-to-text model
    #[serde(default)]
    pub transcription: Option<String>,
}

impl Default for ModelEngines {
    fn default() -> Self {
        Self {
            vision: DEFAULT_VISION_ENGINE.to_string(),
            speech: DEFAULT_SPEECH_ENGINE.to_string(),
            image: DEFAULT_IMAGE_ENGINE.to_string(),
            transcription: None,
        }
    }
}

/// Where the engine lives and which engines to use (stored locally)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub base_url: String,
    #[serde(default)]
    pub insight_id: Option<String>,
    #[serde(default)]
    pub engines: ModelEngines,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            insight_id: None,
            engines: ModelEngines::default(),
        }
    }
}

impl EngineConfig {
    /// Transport settings, with credentials and a base URL override from the
    /// environment
    pub fn api_config(&self) -> ApiConfig {
        let base_url = std::env::var(BASE_URL_VAR)
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.base_url.clone());

        ApiConfig {
            base_url,
            insight_id: self.insight_id.clone(),
            credentials: Credentials::from_env(),
        }
    }
}

impl ConfigKey<EngineConfig> {
    pub const ENGINE: Self = Self::new("engineConfig");
}

// ===== Type-Safe Config Store =====

pub trait ConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T>;
    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError>;
    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError>;
}

/// Config store persisted as one JSON object, saved after every change
pub struct FileConfigStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, Value>>,
}

impl FileConfigStore {
    /// Open `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {:?}, starting empty", path);
                BTreeMap::new()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// `<user config dir>/model-studio/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(Self::default_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, data: &BTreeMap<String, Value>) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, contents).map_err(write_error)?;
        info!("Saved config to {:?}", self.path);
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.key_name())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError> {
        let val = serde_json::to_value(value)?;
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.key_name().to_string(), val);
        self.save(&data)
    }

    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.remove(key.key_name());
        self.save(&data)
    }
}

/// Stored engine config, or the defaults when nothing is stored
pub fn load_engine_config(store: &impl ConfigStore) -> EngineConfig {
    store.get(&ConfigKey::ENGINE).unwrap_or_default()
}
