use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use brickbot_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_token = config
        .server
        .api_token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let fields: [(&str, String, &[&str]); 12] = [
        ("database.url", config.database.url.clone(), &["BRICKBOT_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["BRICKBOT_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["BRICKBOT_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["BRICKBOT_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["BRICKBOT_SERVER_PORT"]),
        ("server.api_token", api_token, &["BRICKBOT_SERVER_API_TOKEN"]),
        (
            "dialog.fulfillment_message",
            config.dialog.fulfillment_message.clone(),
            &["BRICKBOT_DIALOG_FULFILLMENT_MESSAGE"],
        ),
        ("archive.enabled", config.archive.enabled.to_string(), &["BRICKBOT_ARCHIVE_ENABLED"]),
        (
            "archive.root_dir",
            config.archive.root_dir.display().to_string(),
            &["BRICKBOT_ARCHIVE_ROOT_DIR"],
        ),
        ("archive.prefix", format!("{:?}", config.archive.prefix), &["BRICKBOT_ARCHIVE_PREFIX"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["BRICKBOT_LOGGING_LEVEL", "BRICKBOT_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["BRICKBOT_LOGGING_FORMAT", "BRICKBOT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<toml::Table>().ok().map(Value::Table)
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
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible: String = trimmed.chars().take(4).collect();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_a_short_prefix() {
        assert_eq!(redact_token("codehook-shared-token-0001"), "code***");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn dotted_paths_resolve_nested_tables() {
        let doc = Value::Table("[archive]\nenabled = true\n".parse().expect("toml"));
        assert!(contains_path(&doc, "archive.enabled"));
        assert!(!contains_path(&doc, "archive.prefix"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
