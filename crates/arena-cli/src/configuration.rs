use arena::auth::AuthContext;
use arena::config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use arena::errors::ArenaError;
use arena::slots::SlotLayout;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid setting: {0}")]
    Invalid(#[from] ArenaError),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted settings key, e.g. `server.base_url`
pub fn to_env_var(field: &str) -> String {
    format!("ARENA_{}", field.to_uppercase().replace('.', "__"))
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default = "default_slots")]
    pub slots: usize,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load()
    }

    fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.base_url", default_base_url())?
            .set_default("server.timeout_secs", default_timeout_secs())?
            .set_default("slots", default_slots() as u64)?
            // Optional arena.toml in the working directory
            .add_source(File::with_name("arena").required(false))
            .add_source(
                Environment::with_prefix("ARENA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            if let config::ConfigError::NotFound(field) = &err {
                ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                }
            } else {
                ConfigError::Other(err)
            }
        })
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        Ok(ClientConfig::new(self.server.base_url.clone())
            .with_timeout(Duration::from_secs(self.server.timeout_secs))
            .with_slots(SlotLayout::new(self.slots)?))
    }

    /// Basic credentials when a username is configured, anonymous otherwise
    pub fn auth_context(&self) -> Result<AuthContext, ConfigError> {
        match (&self.auth.username, &self.auth.password) {
            (Some(username), password) => Ok(AuthContext::basic(
                username,
                password.as_deref().unwrap_or_default(),
            )?),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("auth.username"),
            }),
            (None, None) => Ok(AuthContext::anonymous()),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_slots() -> usize {
    SlotLayout::default().len()
}
