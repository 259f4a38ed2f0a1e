use crate::domain::KeybindingOverrides;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const CONFIG_ENV: &str = "GITDECK_CONFIG";
const DEFAULT_ROUTER_PROGRAM: &str = "git";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsoleConfig {
    pub profile: String,
    pub keybindings: KeybindingOverrides,
    pub router_program: String,
    pub workflows: Vec<WorkflowConfig>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            keybindings: KeybindingOverrides::new(),
            router_program: DEFAULT_ROUTER_PROGRAM.to_string(),
            workflows: Vec::new(),
        }
    }
}

/// A named workflow persisted in the config file. Loaded read-only.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct WorkflowConfig {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// A config plus everything that had to be defaulted while reading it.
#[derive(Clone, Debug, Default)]
pub struct LoadedConfig {
    pub config: ConsoleConfig,
    pub warnings: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeySpec {
    One(String),
    Many(Vec<String>),
}

impl KeySpec {
    fn into_keys(self) -> Vec<String> {
        match self {
            Self::One(key) => vec![key],
            Self::Many(keys) => keys,
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gitdeck").join("config.json"))
}

/// `--config` wins over the environment, which wins over the platform default.
pub fn resolve_config_path(cli: Option<&Path>, env: Option<String>) -> Option<PathBuf> {
    if let Some(path) = cli {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.filter(|value| !value.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    default_config_path()
}

/// Reads the raw document. A missing file is `Ok(None)`.
pub fn read_config_document(path: &Path) -> Result<Option<Value>, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Loads the config, never failing: anything unusable falls back to its default.
pub fn load_config(path: Option<&Path>) -> LoadedConfig {
    let Some(path) = path else {
        return LoadedConfig::default();
    };
    match read_config_document(path) {
        Ok(Some(document)) => config_from_document(&document),
        Ok(None) => LoadedConfig::default(),
        Err(error) => {
            warn!(%error, "using default configuration");
            LoadedConfig {
                config: ConsoleConfig::default(),
                warnings: vec![error.to_string()],
            }
        }
    }
}

pub fn config_from_document(document: &Value) -> LoadedConfig {
    let mut loaded = LoadedConfig::default();
    let Some(root) = document.as_object() else {
        loaded.warn("config root is not an object");
        return loaded;
    };

    if let Some(interactive) = root.get("interactive") {
        match interactive.as_object() {
            Some(section) => {
                if let Some(profile) = section.get("profile") {
                    match profile.as_str() {
                        Some(name) => loaded.config.profile = name.to_string(),
                        None => loaded.warn("interactive.profile is not a string"),
                    }
                }
                if let Some(bindings) = section.get("keybindings") {
                    loaded.config.keybindings = parse_keybindings(bindings, &mut loaded.warnings);
                }
            }
            None => loaded.warn("interactive is not an object"),
        }
    }

    if let Some(router) = root.get("router") {
        match router.get("program").and_then(Value::as_str) {
            Some(program) if !program.trim().is_empty() => {
                loaded.config.router_program = program.trim().to_string();
            }
            _ => loaded.warn("router.program is missing or not a string"),
        }
    }

    if let Some(workflows) = root.get("workflows") {
        match workflows.as_array() {
            Some(entries) => {
                for (index, entry) in entries.iter().enumerate() {
                    match WorkflowConfig::deserialize(entry) {
                        Ok(workflow) if !workflow.name.trim().is_empty() => {
                            loaded.config.workflows.push(workflow);
                        }
                        Ok(_) => loaded.warn(&format!("workflows[{index}] has an empty name")),
                        Err(error) => loaded.warn(&format!("workflows[{index}]: {error}")),
                    }
                }
            }
            None => loaded.warn("workflows is not an array"),
        }
    }

    loaded
}

fn parse_keybindings(value: &Value, warnings: &mut Vec<String>) -> KeybindingOverrides {
    let Some(contexts) = value.as_object() else {
        push_warning(warnings, "interactive.keybindings is not an object");
        return KeybindingOverrides::new();
    };

    let mut overrides = KeybindingOverrides::new();
    for (context, actions) in contexts {
        let Some(actions) = actions.as_object() else {
            push_warning(
                warnings,
                &format!("keybindings.{context} is not an object"),
            );
            continue;
        };
        let mut parsed = BTreeMap::new();
        for (action, keys) in actions {
            match KeySpec::deserialize(keys) {
                Ok(spec) => {
                    parsed.insert(action.clone(), spec.into_keys());
                }
                Err(_) => push_warning(
                    warnings,
                    &format!("keybindings.{context}.{action} must be a string or a list of strings"),
                ),
            }
        }
        overrides.insert(context.clone(), parsed);
    }
    overrides
}

fn push_warning(warnings: &mut Vec<String>, detail: &str) {
    warn!(detail, "config field ignored");
    warnings.push(detail.to_string());
}

impl LoadedConfig {
    fn warn(&mut self, detail: &str) {
        push_warning(&mut self.warnings, detail);
    }
}
