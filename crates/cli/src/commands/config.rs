use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use canteen_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// One reported setting: dotted key, rendered value, and the env keys that may override it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["CANTEEN_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["CANTEEN_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["CANTEEN_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["CANTEEN_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["CANTEEN_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["CANTEEN_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["CANTEEN_LOGGING_LEVEL", "CANTEEN_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["CANTEEN_LOGGING_FORMAT", "CANTEEN_LOG_FORMAT"],
        },
        Field {
            key: "limits.quantity_max",
            value: config.limits.quantity_max.to_string(),
            env_keys: &["CANTEEN_LIMITS_QUANTITY_MAX"],
        },
        Field {
            key: "limits.quantity_fraction_digits",
            value: config.limits.quantity_fraction_digits.to_string(),
            env_keys: &["CANTEEN_LIMITS_QUANTITY_FRACTION_DIGITS"],
        },
        Field {
            key: "limits.price_max",
            value: config.limits.price_max.to_string(),
            env_keys: &["CANTEEN_LIMITS_PRICE_MAX"],
        },
        Field {
            key: "limits.price_fraction_digits",
            value: config.limits.price_fraction_digits.to_string(),
            env_keys: &["CANTEEN_LIMITS_PRICE_FRACTION_DIGITS"],
        },
        Field {
            key: "startup.seed_demo_data",
            value: config.startup.seed_demo_data.to_string(),
            env_keys: &["CANTEEN_STARTUP_SEED_DEMO_DATA"],
        },
        Field {
            key: "startup.apply_legacy_policy",
            value: config.startup.apply_legacy_policy.to_string(),
            env_keys: &["CANTEEN_STARTUP_APPLY_LEGACY_POLICY"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["canteen.toml", "config/canteen.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
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
