//! YAML loading with `!env_var` substitution
//!
//! Any scalar may be written as `!env_var NAME`; the variable's value is
//! parsed as a YAML scalar, so numbers stay numbers.

use serde_yaml::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use crate::config::HautoConfig;
use crate::error::{ConfigError, ConfigResult};

/// Load, parse and validate a configuration file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<HautoConfig> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading configuration");

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse(&content, path)
}

impl HautoConfig {
    /// Parse and validate configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        parse(content, Path::new("<string>"))
    }
}

fn parse(content: &str, source_path: &Path) -> ConfigResult<HautoConfig> {
    let parse_error = |source| ConfigError::ParseYaml {
        path: source_path.to_path_buf(),
        source,
    };

    let raw: Value = serde_yaml::from_str(content).map_err(parse_error)?;
    let config: HautoConfig = match process_value(raw)? {
        // an empty document means all defaults
        Value::Null => HautoConfig::default(),
        value => serde_yaml::from_value(value).map_err(parse_error)?,
    };

    config.validate()?;
    Ok(config)
}

fn process_value(value: Value) -> ConfigResult<Value> {
    match value {
        Value::Tagged(tagged) if tagged.tag == "!env_var" => process_env_var(tagged.value),
        Value::Mapping(map) => {
            let mut result = serde_yaml::Mapping::new();
            for (k, v) in map {
                result.insert(k, process_value(v)?);
            }
            Ok(Value::Mapping(result))
        }
        Value::Sequence(seq) => {
            let result: ConfigResult<Vec<Value>> = seq.into_iter().map(process_value).collect();
            Ok(Value::Sequence(result?))
        }
        _ => Ok(value),
    }
}

fn process_env_var(value: Value) -> ConfigResult<Value> {
    let var_name = match value {
        Value::String(s) => s,
        _ => {
            return Err(ConfigError::invalid(
                "!env_var",
                "environment variable name must be a string",
            ))
        }
    };

    let env_value = std::env::var(&var_name).map_err(|_| ConfigError::EnvVarNotFound {
        var: var_name.clone(),
    })?;

    trace!(var = %var_name, "Substituted env var");
    Ok(serde_yaml::from_str(&env_value).unwrap_or(Value::String(env_value)))
}
