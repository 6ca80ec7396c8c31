//! Layered configuration: defaults, then the TOML file, then `GARCON_*` environment
//! variables, then programmatic overrides. Every layer is a [`ConfigPatch`] merged the
//! same way; validation runs once on the result.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Searched in order when no explicit path is given.
pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["garcon.toml", "config/garcon.toml"];

const SLACK_APPS_URL: &str = "https://api.slack.com/apps";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub conversation: ConversationConfig,
    pub restaurants: RestaurantsConfig,
    pub delivery: DeliveryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub bot_name: String,
    /// Channels the bot may reply in. Empty means every channel.
    pub allowed_channels: Vec<String>,
    /// Enables the Events API endpoint when set.
    pub signing_secret: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub collaborator_timeout_secs: u64,
    /// Where deliveries are sent; also the origin for restaurant lookups.
    pub dropoff_address: String,
}

#[derive(Clone, Debug)]
pub struct RestaurantsConfig {
    pub base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(invalid(format!(
                "logging.format `{other}` is not one of compact|pretty|json"
            ))),
        }
    }
}

/// Values set in code; these win over every other layer.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_bot_name: Option<String>,
    pub slack_allowed_channels: Option<Vec<String>>,
    pub slack_signing_secret: Option<String>,
    pub collaborator_timeout_secs: Option<u64>,
    pub dropoff_address: Option<String>,
    pub restaurants_base_url: Option<String>,
    pub delivery_base_url: Option<String>,
    pub delivery_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("config file references `${{{var}}}` but that environment variable is not set")]
    UnsetVariable { var: String },
    #[error("config file has a `${{` without a closing `}}`")]
    UnterminatedInterpolation,
    #[error("environment variable {key}=`{value}` is not a valid value")]
    InvalidEnvValue { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: SecretString::from(String::new()),
                bot_token: SecretString::from(String::new()),
                bot_name: "garcon".to_owned(),
                allowed_channels: Vec::new(),
                signing_secret: None,
            },
            conversation: ConversationConfig {
                collaborator_timeout_secs: 10,
                dropoff_address: String::new(),
            },
            restaurants: RestaurantsConfig { base_url: None },
            delivery: DeliveryConfig { base_url: None, api_key: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_owned(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_config_file(options.config_path.as_deref()) {
            Some(path) => config.merge(ConfigPatch::from_file(&path)?),
            None if options.require_file => {
                let expected = options
                    .config_path
                    .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }
        config.merge(ConfigPatch::from_env()?);
        config.merge(options.overrides.into_patch());

        config.validate()?;
        Ok(config)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.conversation.collaborator_timeout_secs)
    }

    fn merge(&mut self, patch: ConfigPatch) {
        let ConfigPatch { slack, conversation, restaurants, delivery, server, logging } = patch;

        overwrite(&mut self.slack.app_token, slack.app_token.map(SecretString::from));
        overwrite(&mut self.slack.bot_token, slack.bot_token.map(SecretString::from));
        overwrite(&mut self.slack.bot_name, slack.bot_name);
        overwrite(&mut self.slack.allowed_channels, slack.allowed_channels);
        overwrite(
            &mut self.slack.signing_secret,
            slack.signing_secret.map(|secret| Some(SecretString::from(secret))),
        );

        overwrite(
            &mut self.conversation.collaborator_timeout_secs,
            conversation.collaborator_timeout_secs,
        );
        overwrite(&mut self.conversation.dropoff_address, conversation.dropoff_address);

        overwrite(&mut self.restaurants.base_url, restaurants.base_url.map(Some));
        overwrite(&mut self.delivery.base_url, delivery.base_url.map(Some));
        overwrite(
            &mut self.delivery.api_key,
            delivery.api_key.map(|key| Some(SecretString::from(key))),
        );

        overwrite(&mut self.server.bind_address, server.bind_address);
        overwrite(&mut self.server.health_check_port, server.health_check_port);
        overwrite(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);

        overwrite(&mut self.logging.level, logging.level);
        overwrite(&mut self.logging.format, logging.format);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_slack()?;

        let timeout = self.conversation.collaborator_timeout_secs;
        if !(1..=120).contains(&timeout) {
            return Err(invalid("conversation.collaborator_timeout_secs must be in range 1..=120"));
        }

        if let Some(base_url) = &self.restaurants.base_url {
            require_http_url("restaurants.base_url", base_url)?;
        }
        if let Some(base_url) = &self.delivery.base_url {
            require_http_url("delivery.base_url", base_url)?;
            if !is_set(self.delivery.api_key.as_ref()) {
                return Err(invalid("delivery.api_key is required when delivery.base_url is set"));
            }
        }

        if self.server.health_check_port == 0 {
            return Err(invalid("server.health_check_port must be greater than zero"));
        }
        if self.server.graceful_shutdown_secs == 0 {
            return Err(invalid("server.graceful_shutdown_secs must be greater than zero"));
        }

        match self.logging.level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(invalid("logging.level must be one of trace|debug|info|warn|error")),
        }
    }

    fn validate_slack(&self) -> Result<(), ConfigError> {
        let slack = &self.slack;
        require_token(
            "slack.app_token",
            &slack.app_token,
            "xapp-",
            "xoxb-",
            "Basic Information > App-Level Tokens",
        )?;
        require_token(
            "slack.bot_token",
            &slack.bot_token,
            "xoxb-",
            "xapp-",
            "OAuth & Permissions > Bot User OAuth Token",
        )?;

        if slack.bot_name.trim().is_empty() {
            return Err(invalid("slack.bot_name must not be empty"));
        }
        if slack.allowed_channels.iter().any(|channel| channel.trim().is_empty()) {
            return Err(invalid("slack.allowed_channels must not contain blank channel ids"));
        }
        if slack.signing_secret.is_some() && !is_set(slack.signing_secret.as_ref()) {
            return Err(invalid("slack.signing_secret must not be blank when set"));
        }
        Ok(())
    }
}

fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn is_set(secret: Option<&SecretString>) -> bool {
    secret.is_some_and(|secret| !secret.expose_secret().trim().is_empty())
}

fn require_token(
    key: &str,
    token: &SecretString,
    prefix: &str,
    swapped_prefix: &str,
    location: &str,
) -> Result<(), ConfigError> {
    let token = token.expose_secret();
    if token.trim().is_empty() {
        return Err(invalid(format!(
            "{key} is required. Get it from {SLACK_APPS_URL} > Your App > {location}"
        )));
    }
    if !token.starts_with(prefix) {
        let hint = if token.starts_with(swapped_prefix) {
            " (hint: the app and bot tokens look swapped)"
        } else {
            ""
        };
        return Err(invalid(format!(
            "{key} must start with `{prefix}`{hint}. Get it from {SLACK_APPS_URL} > Your App > {location}"
        )));
    }
    Ok(())
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(invalid(format!("{key} must start with http:// or https://")))
    }
}

fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => CONFIG_FILE_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

/// Replaces every `${VAR}` with the value of that environment variable.
fn interpolate_env(raw: &str) -> Result<String, ConfigError> {
    let mut rendered = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after[..end];
        let value =
            env::var(var).map_err(|_| ConfigError::UnsetVariable { var: var.to_owned() })?;
        rendered.push_str(&value);
        rest = &after[end + 1..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    env_value(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvValue {
                key: key.to_owned(),
                value: value.clone(),
            })
        })
        .transpose()
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(str::to_owned).collect()
}

/// One configuration layer; `None` leaves the value below it untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigPatch {
    slack: SlackPatch,
    conversation: ConversationPatch,
    restaurants: RestaurantsPatch,
    delivery: DeliveryPatch,
    server: ServerPatch,
    logging: LoggingPatch,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    bot_name: Option<String>,
    allowed_channels: Option<Vec<String>>,
    signing_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConversationPatch {
    collaborator_timeout_secs: Option<u64>,
    dropoff_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RestaurantsPatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeliveryPatch {
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigPatch {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        toml::from_str(&interpolate_env(&raw)?)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    /// `GARCON_LOG_LEVEL` and `GARCON_LOG_FORMAT` are accepted as short aliases.
    fn from_env() -> Result<Self, ConfigError> {
        let log_format = env_value("GARCON_LOGGING_FORMAT")
            .or_else(|| env_value("GARCON_LOG_FORMAT"))
            .map(|value| value.parse::<LogFormat>())
            .transpose()?;

        Ok(Self {
            slack: SlackPatch {
                app_token: env_value("GARCON_SLACK_APP_TOKEN"),
                bot_token: env_value("GARCON_SLACK_BOT_TOKEN"),
                bot_name: env_value("GARCON_SLACK_BOT_NAME"),
                allowed_channels: env_value("GARCON_SLACK_ALLOWED_CHANNELS")
                    .map(|value| split_list(&value)),
                signing_secret: env_value("GARCON_SLACK_SIGNING_SECRET"),
            },
            conversation: ConversationPatch {
                collaborator_timeout_secs: env_parsed(
                    "GARCON_CONVERSATION_COLLABORATOR_TIMEOUT_SECS",
                )?,
                dropoff_address: env_value("GARCON_CONVERSATION_DROPOFF_ADDRESS"),
            },
            restaurants: RestaurantsPatch { base_url: env_value("GARCON_RESTAURANTS_BASE_URL") },
            delivery: DeliveryPatch {
                base_url: env_value("GARCON_DELIVERY_BASE_URL"),
                api_key: env_value("GARCON_DELIVERY_API_KEY"),
            },
            server: ServerPatch {
                bind_address: env_value("GARCON_SERVER_BIND_ADDRESS"),
                health_check_port: env_parsed("GARCON_SERVER_HEALTH_CHECK_PORT")?,
                graceful_shutdown_secs: env_parsed("GARCON_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
            },
            logging: LoggingPatch {
                level: env_value("GARCON_LOGGING_LEVEL").or_else(|| env_value("GARCON_LOG_LEVEL")),
                format: log_format,
            },
        })
    }
}

impl ConfigOverrides {
    fn into_patch(self) -> ConfigPatch {
        ConfigPatch {
            slack: SlackPatch {
                app_token: self.slack_app_token,
                bot_token: self.slack_bot_token,
                bot_name: self.slack_bot_name,
                allowed_channels: self.slack_allowed_channels,
                signing_secret: self.slack_signing_secret,
            },
            conversation: ConversationPatch {
                collaborator_timeout_secs: self.collaborator_timeout_secs,
                dropoff_address: self.dropoff_address,
            },
            restaurants: RestaurantsPatch { base_url: self.restaurants_base_url },
            delivery: DeliveryPatch {
                base_url: self.delivery_base_url,
                api_key: self.delivery_api_key,
            },
            server: ServerPatch::default(),
            logging: LoggingPatch { level: self.log_level, format: None },
        }
    }
}
