use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialog::responder::DEFAULT_FULFILLMENT_MESSAGE;
use crate::errors::ApplicationError;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["brickbot.toml", "config/brickbot.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub dialog: DialogConfig,
    pub archive: ArchiveConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub api_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct DialogConfig {
    pub fulfillment_message: String,
}

#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub root_dir: PathBuf,
    pub prefix: String,
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub api_token: Option<String>,
    pub archive_enabled: Option<bool>,
    pub archive_root_dir: Option<PathBuf>,
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
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://brickbot.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                api_token: None,
            },
            dialog: DialogConfig { fulfillment_message: DEFAULT_FULFILLMENT_MESSAGE.to_string() },
            archive: ArchiveConfig {
                enabled: false,
                root_dir: PathBuf::from("var/log-archive"),
                prefix: String::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("brickbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(api_token_value) = server.api_token {
                self.server.api_token = Some(secret_value(api_token_value));
            }
        }

        if let Some(dialog) = patch.dialog {
            if let Some(fulfillment_message) = dialog.fulfillment_message {
                self.dialog.fulfillment_message = fulfillment_message;
            }
        }

        if let Some(archive) = patch.archive {
            if let Some(enabled) = archive.enabled {
                self.archive.enabled = enabled;
            }
            if let Some(root_dir) = archive.root_dir {
                self.archive.root_dir = root_dir;
            }
            if let Some(prefix) = archive.prefix {
                self.archive.prefix = prefix;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BRICKBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("BRICKBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("BRICKBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("BRICKBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("BRICKBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BRICKBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("BRICKBOT_SERVER_PORT") {
            self.server.port = parse_u16("BRICKBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("BRICKBOT_SERVER_API_TOKEN") {
            self.server.api_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("BRICKBOT_DIALOG_FULFILLMENT_MESSAGE") {
            self.dialog.fulfillment_message = value;
        }

        if let Some(value) = read_env("BRICKBOT_ARCHIVE_ENABLED") {
            self.archive.enabled = parse_bool("BRICKBOT_ARCHIVE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("BRICKBOT_ARCHIVE_ROOT_DIR") {
            self.archive.root_dir = PathBuf::from(value);
        }
        // An empty prefix is meaningful, so this one is read without the blank filter.
        if let Ok(value) = env::var("BRICKBOT_ARCHIVE_PREFIX") {
            self.archive.prefix = value;
        }

        let log_level =
            read_env("BRICKBOT_LOGGING_LEVEL").or_else(|| read_env("BRICKBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BRICKBOT_LOGGING_FORMAT").or_else(|| read_env("BRICKBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(api_token) = overrides.api_token {
            self.server.api_token = Some(secret_value(api_token));
        }
        if let Some(enabled) = overrides.archive_enabled {
            self.archive.enabled = enabled;
        }
        if let Some(root_dir) = overrides.archive_root_dir {
            self.archive.root_dir = root_dir;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_dialog(&self.dialog)?;
        validate_archive(&self.archive)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if let Some(token) = &server.api_token {
        if token.expose_secret().trim().len() < 16 {
            return Err(ConfigError::Validation(
                "server.api_token must be at least 16 characters when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_dialog(dialog: &DialogConfig) -> Result<(), ConfigError> {
    if dialog.fulfillment_message.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dialog.fulfillment_message must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_archive(archive: &ArchiveConfig) -> Result<(), ConfigError> {
    if archive.enabled && archive.root_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "archive.root_dir is required when archive.enabled is true".to_string(),
        ));
    }

    if archive.prefix.starts_with('/') || archive.prefix.contains("..") {
        return Err(ConfigError::Validation(
            "archive.prefix must be a relative key prefix without `..`".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    dialog: Option<DialogPatch>,
    archive: Option<ArchivePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    api_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DialogPatch {
    fulfillment_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivePatch {
    enabled: Option<bool>,
    root_dir: Option<PathBuf>,
    prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
