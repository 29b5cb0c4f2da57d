use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::numeric::{NumericField, NumericLimits};

/// Fractional digits beyond this are never useful for quantities or money.
const MAX_CONFIGURABLE_FRACTION_DIGITS: u32 = 10;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
    pub startup: StartupConfig,
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
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitsConfig {
    pub quantity_max: Decimal,
    pub quantity_fraction_digits: u32,
    pub price_max: Decimal,
    pub price_fraction_digits: u32,
}

#[derive(Clone, Debug)]
pub struct StartupConfig {
    pub seed_demo_data: bool,
    pub apply_legacy_policy: bool,
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
    pub server_port: Option<u16>,
    pub seed_demo_data: Option<bool>,
    pub apply_legacy_policy: Option<bool>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://canteen.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            limits: LimitsConfig::default(),
            startup: StartupConfig { seed_demo_data: true, apply_legacy_policy: true },
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let defaults = NumericLimits::default();
        Self {
            quantity_max: defaults.quantity.limits.max_exclusive,
            quantity_fraction_digits: defaults.quantity.limits.max_fraction_digits,
            price_max: defaults.unit_price.limits.max_exclusive,
            price_fraction_digits: defaults.unit_price.limits.max_fraction_digits,
        }
    }
}

impl LimitsConfig {
    pub fn numeric_limits(&self) -> NumericLimits {
        NumericLimits {
            quantity: NumericField::quantity(self.quantity_max, self.quantity_fraction_digits),
            unit_price: NumericField::money(self.price_max, self.price_fraction_digits),
        }
    }
}

impl FromStr for LogFormat {
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("canteen.toml"));
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
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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

        if let Some(limits) = patch.limits {
            if let Some(quantity_max) = limits.quantity_max {
                self.limits.quantity_max = quantity_max;
            }
            if let Some(digits) = limits.quantity_fraction_digits {
                self.limits.quantity_fraction_digits = digits;
            }
            if let Some(price_max) = limits.price_max {
                self.limits.price_max = price_max;
            }
            if let Some(digits) = limits.price_fraction_digits {
                self.limits.price_fraction_digits = digits;
            }
        }

        if let Some(startup) = patch.startup {
            if let Some(seed_demo_data) = startup.seed_demo_data {
                self.startup.seed_demo_data = seed_demo_data;
            }
            if let Some(apply_legacy_policy) = startup.apply_legacy_policy {
                self.startup.apply_legacy_policy = apply_legacy_policy;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CANTEEN_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CANTEEN_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("CANTEEN_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CANTEEN_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("CANTEEN_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CANTEEN_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CANTEEN_SERVER_PORT") {
            self.server.port = parse_env("CANTEEN_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CANTEEN_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("CANTEEN_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("CANTEEN_LOGGING_LEVEL").or_else(|| read_env("CANTEEN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CANTEEN_LOGGING_FORMAT").or_else(|| read_env("CANTEEN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("CANTEEN_LIMITS_QUANTITY_MAX") {
            self.limits.quantity_max = parse_env_decimal("CANTEEN_LIMITS_QUANTITY_MAX", &value)?;
        }
        if let Some(value) = read_env("CANTEEN_LIMITS_QUANTITY_FRACTION_DIGITS") {
            self.limits.quantity_fraction_digits =
                parse_env("CANTEEN_LIMITS_QUANTITY_FRACTION_DIGITS", &value)?;
        }
        if let Some(value) = read_env("CANTEEN_LIMITS_PRICE_MAX") {
            self.limits.price_max = parse_env_decimal("CANTEEN_LIMITS_PRICE_MAX", &value)?;
        }
        if let Some(value) = read_env("CANTEEN_LIMITS_PRICE_FRACTION_DIGITS") {
            self.limits.price_fraction_digits =
                parse_env("CANTEEN_LIMITS_PRICE_FRACTION_DIGITS", &value)?;
        }

        if let Some(value) = read_env("CANTEEN_STARTUP_SEED_DEMO_DATA") {
            self.startup.seed_demo_data = parse_env("CANTEEN_STARTUP_SEED_DEMO_DATA", &value)?;
        }
        if let Some(value) = read_env("CANTEEN_STARTUP_APPLY_LEGACY_POLICY") {
            self.startup.apply_legacy_policy =
                parse_env("CANTEEN_STARTUP_APPLY_LEGACY_POLICY", &value)?;
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
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(seed_demo_data) = overrides.seed_demo_data {
            self.startup.seed_demo_data = seed_demo_data;
        }
        if let Some(apply_legacy_policy) = overrides.apply_legacy_policy {
            self.startup.apply_legacy_policy = apply_legacy_policy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_limits(&self.limits)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("canteen.toml"), PathBuf::from("config/canteen.toml")]
        .into_iter()
        .find(|path| path.exists())
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

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn validate_limits(limits: &LimitsConfig) -> Result<(), ConfigError> {
    let ceilings = [("limits.quantity_max", limits.quantity_max), ("limits.price_max", limits.price_max)];
    for (key, ceiling) in ceilings {
        if ceiling <= Decimal::ZERO {
            return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
        }
    }
    if limits.quantity_max.checked_mul(limits.price_max).is_none() {
        return Err(ConfigError::Validation(
            "limits.quantity_max * limits.price_max must fit a decimal cost".to_string(),
        ));
    }

    let digits = [
        ("limits.quantity_fraction_digits", limits.quantity_fraction_digits),
        ("limits.price_fraction_digits", limits.price_fraction_digits),
    ];
    for (key, value) in digits {
        if value > MAX_CONFIGURABLE_FRACTION_DIGITS {
            return Err(ConfigError::Validation(format!(
                "{key} must be in range 0..={MAX_CONFIGURABLE_FRACTION_DIGITS}"
            )));
        }
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_env_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str_exact(value.trim()).map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    limits: Option<LimitsPatch>,
    startup: Option<StartupPatch>,
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
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsPatch {
    #[serde(default, deserialize_with = "exact_decimal")]
    quantity_max: Option<Decimal>,
    quantity_fraction_digits: Option<u32>,
    #[serde(default, deserialize_with = "exact_decimal")]
    price_max: Option<Decimal>,
    price_fraction_digits: Option<u32>,
}

/// Ceilings are read from quoted strings or integers only; TOML floats would
/// pass through binary floating point.
fn exact_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ExactDecimalVisitor;

    impl Visitor<'_> for ExactDecimalVisitor {
        type Value = Decimal;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a decimal as a quoted string or an integer")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Decimal, E> {
            Decimal::from_str_exact(value.trim())
                .map_err(|_| E::custom(format!("`{value}` is not a plain decimal")))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(value))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(value))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Decimal, E> {
            Err(E::custom(format!("float `{value}` is not exact; quote the value as a string")))
        }
    }

    deserializer.deserialize_any(ExactDecimalVisitor).map(Some)
}

#[derive(Debug, Default, Deserialize)]
struct StartupPatch {
    seed_demo_data: Option<bool>,
    apply_legacy_policy: Option<bool>,
}
