use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use garcon_core::config::{AppConfig, LoadOptions, CONFIG_FILE_CANDIDATES};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    render(&config, config_file_doc.as_ref(), config_file_path.as_deref())
}

/// One line per effective setting, secrets redacted, each tagged with where it came from.
pub fn render(
    config: &AppConfig,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    for (key_path, env_keys, value) in effective_values(config) {
        let source = field_source(key_path, env_keys, config_file_doc, config_file_path);
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<Row> {
    let allowed_channels = if config.slack.allowed_channels.is_empty() {
        "<all>".to_string()
    } else {
        config.slack.allowed_channels.join(",")
    };

    vec![
        row(
            "slack.app_token",
            &["GARCON_SLACK_APP_TOKEN"],
            redact_token(config.slack.app_token.expose_secret()),
        ),
        row(
            "slack.bot_token",
            &["GARCON_SLACK_BOT_TOKEN"],
            redact_token(config.slack.bot_token.expose_secret()),
        ),
        row("slack.bot_name", &["GARCON_SLACK_BOT_NAME"], config.slack.bot_name.clone()),
        row("slack.allowed_channels", &["GARCON_SLACK_ALLOWED_CHANNELS"], allowed_channels),
        row(
            "slack.signing_secret",
            &["GARCON_SLACK_SIGNING_SECRET"],
            presence(config.slack.signing_secret.is_some()),
        ),
        row(
            "conversation.collaborator_timeout_secs",
            &["GARCON_CONVERSATION_COLLABORATOR_TIMEOUT_SECS"],
            config.conversation.collaborator_timeout_secs.to_string(),
        ),
        row(
            "conversation.dropoff_address",
            &["GARCON_CONVERSATION_DROPOFF_ADDRESS"],
            unset_if_empty(&config.conversation.dropoff_address),
        ),
        row(
            "restaurants.base_url",
            &["GARCON_RESTAURANTS_BASE_URL"],
            config.restaurants.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        row(
            "delivery.base_url",
            &["GARCON_DELIVERY_BASE_URL"],
            config.delivery.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        row(
            "delivery.api_key",
            &["GARCON_DELIVERY_API_KEY"],
            presence(config.delivery.api_key.is_some()),
        ),
        row(
            "server.bind_address",
            &["GARCON_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        row(
            "server.health_check_port",
            &["GARCON_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port.to_string(),
        ),
        row(
            "server.graceful_shutdown_secs",
            &["GARCON_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        row(
            "logging.level",
            &["GARCON_LOGGING_LEVEL", "GARCON_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        row(
            "logging.format",
            &["GARCON_LOGGING_FORMAT", "GARCON_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

type Row = (&'static str, &'static [&'static str], String);

fn row(key_path: &'static str, env_keys: &'static [&'static str], value: String) -> Row {
    (key_path, env_keys, value)
}

fn detect_config_path() -> Option<PathBuf> {
    CONFIG_FILE_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn presence(is_set: bool) -> String {
    if is_set { "<redacted>" } else { "<unset>" }.to_string()
}

fn unset_if_empty(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
