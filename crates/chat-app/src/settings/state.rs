use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use skychat_identity::{DEFAULT_REGION, IdentityConfig};

use super::file::{FileAccess, SettingsError, write_json_file};

/// Chat relay the client connects to unless configured otherwise.
pub const DEFAULT_RELAY_ENDPOINT: &str =
    "wss://q8kfwwf6q9.execute-api.us-east-1.amazonaws.com/prod/";
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const SETTINGS_DIRECTORY_NAME: &str = "skychat";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Prefix for environment overrides, e.g. `SKYCHAT_IDENTITY__CLIENT_ID`.
pub const SETTINGS_ENV_PREFIX: &str = "SKYCHAT_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySettings {
    #[serde(default = "default_region")]
    pub region: String,
    /// User pool app client id.
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            region: default_region(),
            client_id: String::new(),
            endpoint: None,
        }
    }
}

impl IdentitySettings {
    /// Returns None if no client id is configured.
    pub fn to_identity_config(&self) -> Option<IdentityConfig> {
        if self.client_id.trim().is_empty() {
            return None;
        }

        let config = IdentityConfig::new(&self.region, &self.client_id);
        Some(match &self.endpoint {
            Some(endpoint) => config.with_endpoint(endpoint),
            None => config,
        })
    }

    fn normalized(mut self) -> Self {
        self.region = if self.region.trim().is_empty() {
            default_region()
        } else {
            self.region.trim().to_string()
        };
        self.client_id = self.client_id.trim().to_string();
        self.endpoint = self
            .endpoint
            .map(|endpoint| endpoint.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_relay_endpoint")]
    pub endpoint: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            endpoint: default_relay_endpoint(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub identity: IdentitySettings,
    #[serde(default)]
    pub relay: RelaySettings,
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            identity: IdentitySettings::default(),
            relay: RelaySettings::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl ClientSettings {
    /// Returns true if the identity service can be reached with these settings.
    pub fn is_valid(&self) -> bool {
        !self.identity.client_id.trim().is_empty()
    }

    pub fn normalized(mut self) -> Self {
        self.identity = self.identity.normalized();
        self.relay.endpoint = if self.relay.endpoint.trim().is_empty() {
            default_relay_endpoint()
        } else {
            self.relay.endpoint.trim().to_string()
        };
        self.log_filter = if self.log_filter.trim().is_empty() {
            default_log_filter()
        } else {
            self.log_filter.trim().to_string()
        };
        self
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".skychat"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads settings from `config_path`, with `SKYCHAT_` environment overrides on
    /// top. A missing or unreadable file yields defaults.
    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_layers(&config_path, Some(SETTINGS_ENV_PREFIX));
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ClientSettings) -> Result<(), SettingsError> {
        let settings = settings.normalized();
        write_json_file(&self.config_path, &settings, FileAccess::Shared)?;
        tracing::info!(path = ?self.config_path, "saved settings");
        self.settings.store(Arc::new(settings));
        Ok(())
    }

    /// Saves a new relay endpoint. It applies to sessions started afterwards.
    pub fn set_relay_endpoint(&self, endpoint: &str) -> Result<String, SettingsError> {
        let mut settings = ClientSettings::clone(&self.settings());
        settings.relay.endpoint = endpoint.to_string();
        self.update(settings)?;
        Ok(self.settings().relay.endpoint.clone())
    }

    fn load_layers(path: &Path, env_prefix: Option<&str>) -> ClientSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let mut figment =
            Figment::from(Serialized::defaults(ClientSettings::default())).merge(Json::file(path));
        if let Some(prefix) = env_prefix {
            figment = figment.merge(Env::prefixed(prefix).split("__"));
        }

        match figment.extract::<ClientSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ClientSettings::default()
            }
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_relay_endpoint() -> String {
    DEFAULT_RELAY_ENDPOINT.to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
