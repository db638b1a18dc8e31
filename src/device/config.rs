use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

static NULL: Value = Value::Null;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config '{name}' not found at {path}")]
    NotFound { name: String, path: String },
    #[error("failed reading config '{name}': {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },
    #[error("failed parsing config '{name}': {source}")]
    Json {
        name: String,
        source: serde_json::Error,
    },
    #[error("config '{name}': {section} must be a JSON object")]
    NotAnObject { name: String, section: String },
    #[error("config '{name}': invalid keys in {section} (expected {expected}, found {found})")]
    InvalidKeys {
        name: String,
        section: String,
        expected: String,
        found: String,
    },
    #[error("config '{name}': {key} must be an integer, got {value}")]
    NotAnInteger {
        name: String,
        key: String,
        value: String,
    },
    #[error("config '{name}': {key} must be a string or integer, got {value}")]
    NotAString {
        name: String,
        key: String,
        value: String,
    },
    #[error("config '{name}': {key} = {value} is out of range")]
    OutOfRange {
        name: String,
        key: String,
        value: i64,
    },
    #[error("config '{name}': no radio section defined (expected one of sdr, rx, tx)")]
    NoChannels { name: String },
    #[error("config '{name}': transceiver (trx) sections are not supported yet")]
    TransceiverUnsupported { name: String },
    #[error("config '{name}': rx and tx both use {port}, they must be separate devices")]
    PortCollision { name: String, port: String },
}

/// A device config file: one JSON object, addressed by its file stem.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    pub name: String,
    root: Map<String, Value>,
}

impl ConfigDocument {
    pub fn load(dir: &Path, name: &str) -> Result<Self, ConfigError> {
        let path = config_path(dir, name);
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                name: name.to_string(),
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            name: name.to_string(),
            source,
        })?;
        Self::parse(name, &content)
    }

    pub fn parse(name: &str, content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content).map_err(|source| ConfigError::Json {
            name: name.to_string(),
            source,
        })?;
        match value {
            Value::Object(root) => Ok(Self {
                name: name.to_string(),
                root,
            }),
            _ => Err(ConfigError::NotAnObject {
                name: name.to_string(),
                section: "document".to_string(),
            }),
        }
    }

    pub fn root(&self) -> Section<'_> {
        Section {
            config: &self.name,
            label: "document".to_string(),
            map: &self.root,
        }
    }

    pub fn section(&self, key: &str) -> Result<Option<Section<'_>>, ConfigError> {
        match self.root.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Section {
                config: &self.name,
                label: format!("{} section", key),
                map,
            })),
            Some(_) => Err(ConfigError::NotAnObject {
                name: self.name.clone(),
                section: format!("{} section", key),
            }),
        }
    }
}

/// A JSON object inside a config document with typed accessors.
pub struct Section<'a> {
    config: &'a str,
    label: String,
    map: &'a Map<String, Value>,
}

impl<'a> Section<'a> {
    pub fn keys(&self) -> BTreeSet<&'a str> {
        self.map.keys().map(String::as_str).collect()
    }

    /// Require the key set to be exactly `expected`.
    pub fn expect_keys(&self, expected: &[&str]) -> Result<(), ConfigError> {
        let wanted: BTreeSet<&str> = expected.iter().copied().collect();
        let found = self.keys();
        if found == wanted {
            return Ok(());
        }
        Err(ConfigError::InvalidKeys {
            name: self.config.to_string(),
            section: self.label.clone(),
            expected: join(&wanted),
            found: join(&found),
        })
    }

    /// Integers may be written as JSON numbers or numeric strings.
    pub fn integer(&self, key: &str) -> Result<i64, ConfigError> {
        let value = self.get(key);
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| ConfigError::NotAnInteger {
            name: self.config.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn port(&self, key: &str) -> Result<u16, ConfigError> {
        let value = self.integer(key)?;
        u16::try_from(value)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ConfigError::OutOfRange {
                name: self.config.to_string(),
                key: key.to_string(),
                value,
            })
    }

    pub fn string(&self, key: &str) -> Result<String, ConfigError> {
        match self.get(key) {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(ConfigError::NotAString {
                name: self.config.to_string(),
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }

    fn get(&self, key: &str) -> &Value {
        self.map.get(key).unwrap_or(&NULL)
    }
}

fn join(keys: &BTreeSet<&str>) -> String {
    keys.iter().copied().collect::<Vec<_>>().join(", ")
}

fn config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

/// Config names (file stems of `*.json`) in a directory, sorted.
pub fn list_configs(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
