use lml_interpreter::{ParserState, Skins, Strictness, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "lml.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid variable '{0}', expected name=value")]
    Variable(String),
}

/// LML configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Unresolved references and failed invocations are fatal
    #[serde(default = "default_strict")]
    pub strict: bool,

    /// Root for `@import` paths
    #[serde(default = "default_template_dir")]
    pub template_dir: String,

    /// Tag that wraps loose text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_tag: Option<String>,

    /// Cap on `@loop`/`@forEach` expansions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_expansions: Option<usize>,

    /// Text or list values bound before rendering
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,

    /// skin name -> tag -> default style
    #[serde(default)]
    pub skins: Skins,
}

fn default_strict() -> bool {
    true
}

fn default_template_dir() -> String {
    "templates".to_string()
}

impl Config {
    /// Load `path`, or `lml.config.json` from `cwd` when it exists
    pub fn load(cwd: &str, path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => PathBuf::from(cwd).join(path),
            None => {
                let path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);
                if !path.exists() {
                    return Ok(Config::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })
    }

    /// Get absolute path to the template directory
    pub fn get_template_dir(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.template_dir)
    }

    /// Apply `name=value` pairs from the command line
    pub fn set_variables(&mut self, pairs: &[String]) -> Result<(), ConfigError> {
        for pair in pairs {
            let (name, value) = pair
                .split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| ConfigError::Variable(pair.clone()))?;
            self.variables
                .insert(name.trim().to_string(), Value::from(value));
        }
        Ok(())
    }

    pub fn parser_state(&self) -> ParserState {
        let strictness = if self.strict {
            Strictness::Strict
        } else {
            Strictness::Lenient
        };
        let mut state = ParserState::new()
            .with_strictness(strictness)
            .with_skins(self.skins.clone());
        if let Some(tag) = &self.text_tag {
            state = state.with_text_tag(tag.clone());
        }
        if let Some(limit) = self.max_expansions {
            state = state.with_max_expansions(limit);
        }
        for (name, value) in &self.variables {
            state = state.with_variable(name.clone(), value.clone());
        }
        state
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict: default_strict(),
            template_dir: default_template_dir(),
            text_tag: None,
            max_expansions: None,
            variables: BTreeMap::new(),
            skins: Skins::default(),
        }
    }
}
