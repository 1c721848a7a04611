use std::collections::HashMap;
use std::path::Path;

use serde_yaml::Value as Yaml;

use super::value::ConfigValue;
use super::ConfigError;

const ENV_PREFIX: &str = "RELMAP_";

/// Flatten `path` into `values` when it exists; a missing file is not an error.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    if !path.is_file() {
        return Ok(());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    load_yaml_str(&content, values)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))
}

pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let document: Yaml =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten(None, &document, values);
    Ok(())
}

/// Write every leaf of `node` under its dot-separated path. Sequences are
/// stored whole under their own key and element by element under `key.N`.
fn flatten(path: Option<&str>, node: &Yaml, out: &mut HashMap<String, ConfigValue>) {
    let child = |segment: &str| match path {
        Some(parent) => format!("{parent}.{segment}"),
        None => segment.to_string(),
    };
    match node {
        Yaml::Mapping(map) => {
            for (k, v) in map {
                let segment = match k {
                    Yaml::String(s) => s.clone(),
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    _ => continue,
                };
                flatten(Some(&child(&segment)), v, out);
            }
        }
        Yaml::Sequence(items) => {
            let Some(key) = path else {
                return;
            };
            out.insert(
                key.to_string(),
                ConfigValue::List(items.iter().map(ConfigValue::from_yaml).collect()),
            );
            for (i, item) in items.iter().enumerate() {
                flatten(Some(&child(&i.to_string())), item, out);
            }
        }
        leaf => {
            if let Some(key) = path {
                out.insert(key.to_string(), ConfigValue::from_yaml(leaf));
            }
        }
    }
}

/// Config key for an environment variable: `RELMAP_CACHE_ENABLED` maps to
/// `relmap.cache.enabled`. Variables outside the prefix are ignored.
///
/// Segments can't contain `_` this way, so `memory_limit_mb` is reachable as
/// `RELMAP_CACHE_MEMORY__LIMIT__MB` (a doubled underscore is kept literally).
pub(crate) fn env_key(name: &str) -> Option<String> {
    if !name.starts_with(ENV_PREFIX) {
        return None;
    }
    let lowered = name.to_lowercase();
    let key = lowered
        .split("__")
        .map(|part| part.replace('_', "."))
        .collect::<Vec<_>>()
        .join("_");
    Some(key)
}
