//! Loader for workspace configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first: YAML files / inline YAML snippets, then
//! `PULSE__`-prefixed environment variables (`__` separates nesting levels, so
//! `PULSE__HTTP__TIMEOUT_SECS=20` sets `http.timeout_secs`). String values may
//! reference other variables as `${VAR}`; expansion is recursive up to a
//! fixed depth.
//!
//! Provider credentials are not usually written into the YAML file. They are
//! discovered from numbered variables (`RAPIDAPI_KEY_1`, `RAPIDAPI_KEY_2`, …)
//! with a single-value fallback (`RAPIDAPI_KEY`), see
//! [`PulseConfig::credential_set`].
use config::{Config, ConfigError, Environment, File};
use pulse_common::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Comma-separated override for `credentials.keys`, read verbatim.
const KEYS_ENV_VAR: &str = "PULSE__CREDENTIALS__KEYS";

/// Default prefix for credential variables.
pub const DEFAULT_CREDENTIAL_PREFIX: &str = "RAPIDAPI_KEY";

#[derive(Debug, Default, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    /// Prefix of the numbered credential variables.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
    /// Explicit keys; when non-empty they take precedence over env discovery.
    #[serde(default, deserialize_with = "keys_as_text")]
    pub keys: Vec<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
            keys: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
            dir: None,
            stderr: false,
        }
    }
}

fn default_env_prefix() -> String {
    DEFAULT_CREDENTIAL_PREFIX.into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_filter() -> String {
    "info".into()
}

/// Failure to assemble a usable credential set.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error(
        "no API credentials configured (set {prefix} or {prefix}_1, {prefix}_2, ... or credentials.keys)"
    )]
    NoCredentialsConfigured { prefix: String },
}

impl PulseConfig {
    /// Ordered credential set: explicit `credentials.keys` if any, otherwise
    /// the numbered environment variables, otherwise the single fallback.
    pub fn credential_set(&self) -> Result<Vec<String>, CredentialError> {
        let explicit: Vec<String> = self
            .credentials
            .keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if !explicit.is_empty() {
            return Ok(explicit);
        }
        discover_credentials(&self.credentials.env_prefix, |name| std::env::var(name).ok())
    }
}

/// Walk `<prefix>_1`, `<prefix>_2`, … until the first missing or blank value;
/// fall back to `<prefix>` when no numbered variable exists.
///
/// ```
/// use pulse_config::discover_credentials;
///
/// let vars = [("KEY_1", "a"), ("KEY_2", "b"), ("KEY_4", "unreachable")];
/// let keys = discover_credentials("KEY", |name| {
///     vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
/// })
/// .unwrap();
/// assert_eq!(keys, vec!["a", "b"]);
/// ```
pub fn discover_credentials<F>(prefix: &str, lookup: F) -> Result<Vec<String>, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut keys = Vec::new();
    let mut index = 1usize;
    while let Some(key) = present(&format!("{prefix}_{index}")) {
        keys.push(key);
        index += 1;
    }

    if keys.is_empty() {
        if let Some(single) = present(prefix) {
            keys.push(single);
        }
    }

    if keys.is_empty() {
        return Err(CredentialError::NoCredentialsConfigured {
            prefix: prefix.to_string(),
        });
    }
    Ok(keys)
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct PulseConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PulseConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseConfigLoader {
    /// Start with `PULSE__` env overrides only; every field has a default.
    ///
    /// ```
    /// use pulse_config::PulseConfigLoader;
    ///
    /// let config = PulseConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nhttp:\n  timeout_secs: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.http.timeout_secs, 3);
    /// assert_eq!(config.http.connect_timeout_secs, 5);
    /// assert_eq!(config.credentials.env_prefix, "RAPIDAPI_KEY");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`PulseConfigLoader::with_file`] but a missing file is not an error,
    /// so headless deployments can rely purely on environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use pulse_config::PulseConfigLoader;
    ///
    /// let cfg = PulseConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// credentials:
    ///   keys: ["first", "second"]
    /// logging:
    ///   format: json
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.credential_set().unwrap(), vec!["first", "second"]);
    /// assert_eq!(cfg.logging.format, pulse_common::LogFormat::Json);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// `${VAR}` placeholders are expanded before materialising the typed structs.
    pub fn load(self) -> Result<PulseConfig, ConfigError> {
        // Added last so environment overrides beat every file source.
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("PULSE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("credentials.keys"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        // Typed parsing would turn an all-digit key into a number.
        if let (Ok(raw), Some(root)) = (std::env::var(KEYS_ENV_VAR), v.as_object_mut()) {
            let credentials = root
                .entry("credentials")
                .or_insert_with(|| Value::Object(Default::default()));
            if let Some(credentials) = credentials.as_object_mut() {
                credentials.insert("keys".to_string(), split_keys(&raw));
            }
        }
        expand_env_in_value(&mut v);

        let typed: PulseConfig =
            serde_json::from_value(v).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

fn split_keys(raw: &str) -> Value {
    Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Value::String(k.to_string()))
            .collect(),
    )
}

/// Keys written as bare YAML numbers are still keys.
fn keys_as_text<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        Text(String),
        Number(serde_json::Number),
    }

    let keys = Vec::<Key>::deserialize(de)?;
    Ok(keys
        .into_iter()
        .map(|k| match k {
            Key::Text(s) => s,
            Key::Number(n) => n.to_string(),
        })
        .collect())
}
