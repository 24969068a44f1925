//! Configuration resolution for wphunter.
//!
//! A [`RuntimeConfig`] is built from layered sources, each later layer
//! overwriting only the fields it sets:
//!
//! 1. Built-in defaults
//! 2. YAML config file (`wphunter.config.yml` unless overridden)
//! 3. Environment variables (`WPHUNTER_*`, then legacy `WORKER_*`)
//! 4. Explicit overrides, usually command-line flags
//!
//! List fields are replaced wholesale. A `targets_file` replaces the inline
//! targets of the same layer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{ConfigError, TargetsError, ValidationError};
use crate::targets::read_targets_file;

/// Config file looked up when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "wphunter.config.yml";

/// Upper bound for `threads`.
pub const MAX_THREADS: i64 = 64;

const ENV_TARGETS: &[&str] = &["WPHUNTER_TARGETS", "WORKER_TARGETS"];
const ENV_TARGETS_FILE: &[&str] = &["WPHUNTER_TARGETS_FILE", "WORKER_TARGETS_FILE"];
const ENV_MODE: &[&str] = &["WPHUNTER_MODE", "WORKER_MODE"];
const ENV_THREADS: &[&str] = &["WPHUNTER_THREADS", "WORKER_THREADS"];
const ENV_OUTPUT_DIR: &[&str] = &["WPHUNTER_OUTPUT_DIR", "WORKER_OUTPUT_DIR"];
const ENV_FORMATS: &[&str] = &["WPHUNTER_FORMATS", "WORKER_FORMATS"];
const ENV_DETECTORS: &[&str] = &["WPHUNTER_DETECTORS", "WORKER_DETECTORS"];
const ENV_DRY_RUN: &[&str] = &["WPHUNTER_DRY_RUN", "WORKER_DRY_RUN"];
const ENV_SUMMARY_FILE: &[&str] = &["WPHUNTER_SUMMARY_FILE", "WORKER_SUMMARY_FILE"];

/// Fully merged settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub targets: Vec<String>,
    /// Scan mode passed to wpprobe: `stealthy`, `bruteforce`, or `hybrid`.
    pub mode: String,
    /// Signed; a negative count from any layer fails [`RuntimeConfig::validate`].
    pub threads: i64,
    pub output_dir: PathBuf,
    pub formats: Vec<String>,
    pub detectors: Vec<String>,
    pub dry_run: bool,
    pub summary_file: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            mode: "hybrid".into(),
            threads: 10,
            output_dir: PathBuf::from("scan-results"),
            formats: vec!["json".into(), "csv".into()],
            detectors: vec!["version".into()],
            dry_run: false,
            summary_file: None,
        }
    }
}

impl RuntimeConfig {
    /// Check every bound, stopping at the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.targets.is_empty() {
            return Err(ValidationError::NoTargets);
        }
        if !(1..=MAX_THREADS).contains(&self.threads) {
            return Err(ValidationError::ThreadsOutOfRange {
                got: self.threads,
                max: MAX_THREADS,
            });
        }
        if self.mode.trim().is_empty() {
            return Err(ValidationError::MissingMode);
        }
        if self.formats.is_empty() {
            return Err(ValidationError::NoFormats);
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyOutputDir);
        }
        Ok(())
    }

    fn apply(&mut self, layer: &Overrides) -> Result<(), TargetsError> {
        if let Some(targets) = &layer.targets {
            self.targets = dedupe(clean_list(targets));
        }
        if let Some(path) = &layer.targets_file {
            self.targets = dedupe(read_targets_file(path)?);
        }
        if let Some(mode) = &layer.mode {
            self.mode = mode.clone();
        }
        if let Some(threads) = layer.threads {
            self.threads = threads;
        }
        if let Some(dir) = &layer.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(formats) = &layer.formats {
            self.formats = clean_list(formats);
        }
        if let Some(detectors) = &layer.detectors {
            self.detectors = clean_list(detectors);
        }
        if let Some(dry_run) = layer.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(summary) = &layer.summary_file {
            self.summary_file = (!summary.as_os_str().is_empty()).then(|| summary.clone());
        }
        Ok(())
    }
}

/// A sparse configuration patch. `None` means the layer leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub targets: Option<Vec<String>>,
    pub targets_file: Option<PathBuf>,
    pub mode: Option<String>,
    pub threads: Option<i64>,
    pub output_dir: Option<PathBuf>,
    pub formats: Option<Vec<String>>,
    pub detectors: Option<Vec<String>>,
    pub dry_run: Option<bool>,
    pub summary_file: Option<PathBuf>,
}

impl Overrides {
    /// Build the environment layer.
    ///
    /// Each key is looked up under its aliases in order and the first
    /// non-empty value wins. A `threads` value that is not an integer is
    /// dropped instead of failing the load; a negative one is kept and
    /// rejected later by validation.
    pub fn from_env(env: &EnvSource) -> Self {
        let lookup = |keys: &[&str]| {
            keys.iter().find_map(|key| {
                env.get(key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        };

        let threads = lookup(ENV_THREADS).and_then(|raw| match raw.parse::<i64>() {
            Ok(n) => Some(n),
            Err(e) => {
                debug!(value = %raw, error = %e, "Ignoring unparsable threads from environment");
                None
            }
        });

        Self {
            targets: lookup(ENV_TARGETS).map(|v| parse_targets_list(&v)),
            targets_file: lookup(ENV_TARGETS_FILE).map(PathBuf::from),
            mode: lookup(ENV_MODE),
            threads,
            output_dir: lookup(ENV_OUTPUT_DIR).map(PathBuf::from),
            formats: lookup(ENV_FORMATS).map(|v| parse_formats(&v)),
            detectors: lookup(ENV_DETECTORS).map(|v| parse_detectors(&v)),
            dry_run: lookup(ENV_DRY_RUN).map(|v| parse_bool(&v)),
            summary_file: lookup(ENV_SUMMARY_FILE).map(PathBuf::from),
        }
    }

    /// Parse a YAML config document into an override layer.
    ///
    /// Empty strings count as unset. A present list key is applied even
    /// when the list is empty.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: Option<FileLayer> = serde_yaml::from_str(content)?;
        let file = file.unwrap_or_default();

        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Ok(Self {
            targets: file.targets.map(|t| t.0),
            targets_file: non_empty(file.targets_file).map(PathBuf::from),
            mode: non_empty(file.mode),
            threads: file.threads,
            output_dir: non_empty(file.output_dir).map(PathBuf::from),
            formats: file.formats,
            detectors: file.detectors,
            dry_run: file.dry_run,
            summary_file: non_empty(file.summary_file).map(PathBuf::from),
        })
    }
}

/// Where the environment layer reads its variables from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The real process environment.
    #[default]
    Process,
    /// A fixed set of variables, for tests and embedding.
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    pub fn fixed<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn get(&self, key: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(key).ok(),
            Self::Fixed(vars) => vars.get(key).cloned(),
        }
    }
}

/// Resolves a [`RuntimeConfig`] from the config file, environment, and
/// explicit overrides.
#[derive(Debug, Clone)]
pub struct Loader {
    config_path: PathBuf,
    env: EnvSource,
}

impl Loader {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            env: EnvSource::Process,
        }
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Merge every layer into a config. The result is not validated; call
    /// [`RuntimeConfig::validate`] before using it for a scan.
    pub fn load(&self, explicit: &Overrides) -> Result<RuntimeConfig, ConfigError> {
        let mut cfg = RuntimeConfig::default();

        if self.config_path.is_file() {
            let file_layer = self.read_file_layer()?;
            debug!(path = %self.config_path.display(), "Applying config file layer");
            cfg.apply(&file_layer)?;
        } else {
            debug!(path = %self.config_path.display(), "No config file found, skipping");
        }

        cfg.apply(&Overrides::from_env(&self.env))?;
        cfg.apply(explicit)?;

        debug!(
            targets = cfg.targets.len(),
            mode = %cfg.mode,
            threads = cfg.threads,
            dry_run = cfg.dry_run,
            "Configuration resolved"
        );
        Ok(cfg)
    }

    fn read_file_layer(&self) -> Result<Overrides, ConfigError> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Read {
                path: self.config_path.clone(),
                source,
            })?;
        Overrides::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

/// Split a target list on commas and line breaks.
pub fn parse_targets_list(input: &str) -> Vec<String> {
    split_on(input, &[',', '\n', '\r'])
}

/// Split a format list on commas, line breaks, and spaces.
pub fn parse_formats(input: &str) -> Vec<String> {
    split_on(input, &[',', '\n', '\r', ' '])
}

/// Split a detector list on commas, line breaks, and spaces.
pub fn parse_detectors(input: &str) -> Vec<String> {
    split_on(input, &[',', '\n', '\r', ' '])
}

fn split_on(input: &str, delimiters: &[char]) -> Vec<String> {
    input
        .split(|c| delimiters.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Drop repeated entries, keeping the first occurrence of each.
fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FileLayer {
    targets: Option<TargetList>,
    targets_file: Option<String>,
    mode: Option<String>,
    threads: Option<i64>,
    output_dir: Option<String>,
    formats: Option<Vec<String>>,
    detectors: Option<Vec<String>>,
    dry_run: Option<bool>,
    summary_file: Option<String>,
}

/// `targets` accepts either a YAML sequence or a delimited scalar.
#[derive(Debug)]
struct TargetList(Vec<String>);

impl<'de> Deserialize<'de> for TargetList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_yaml::Value;

        fn scalar_text(value: &Value) -> Option<String> {
            match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }
        }

        let unsupported = || D::Error::custom("unsupported YAML type for targets");

        match Value::deserialize(deserializer)? {
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(scalar_text(item).ok_or_else(unsupported)?);
                }
                Ok(Self(clean_list(&out)))
            }
            scalar => scalar_text(&scalar)
                .map(|text| Self(parse_targets_list(&text)))
                .ok_or_else(unsupported),
        }
    }
}
