//! Configuration loading - YAML-based, layered, mirroring the teacher
//! lineage's `config.yml` + `environments/deployment.yml` convention.
//!
//! Layers, lowest to highest precedence:
//! 1. [`SessionConfig::default`] (built-in defaults).
//! 2. `<config_dir>/snmp-client.yml`, if present.
//! 3. `<config_dir>/environments/deployment.yml`, if present (partial
//!    overrides merged over whatever came before).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::session::SessionConfig;

/// Load a [`SessionConfig`], applying the override-file layering described
/// above. `config_dir` defaults to `$SNMP_CLIENT_HOME`, then the user's
/// home directory.
pub fn load_config(config_dir: Option<&Path>) -> Result<SessionConfig> {
    let home = config_dir
        .map(PathBuf::from)
        .or_else(|| std::env::var("SNMP_CLIENT_HOME").ok().map(PathBuf::from))
        .or_else(dirs::home_dir)
        .context("cannot determine a configuration directory")?;

    let default_path = home.join("snmp-client.yml");
    let mut config = if default_path.exists() {
        let contents = std::fs::read_to_string(&default_path)
            .with_context(|| format!("failed to read {}", default_path.display()))?;
        serde_yaml::from_str::<SessionConfig>(&contents)
            .with_context(|| format!("failed to parse {}", default_path.display()))?
    } else {
        SessionConfig::default()
    };

    let override_path = home.join("environments").join("deployment.yml");
    if override_path.exists() {
        let contents = std::fs::read_to_string(&override_path)
            .with_context(|| format!("failed to read {}", override_path.display()))?;
        let overrides: serde_yaml::Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", override_path.display()))?;
        apply_overrides(&mut config, &overrides)
            .with_context(|| format!("failed to apply overrides from {}", override_path.display()))?;
        info!("loaded SNMP client config overrides from {}", override_path.display());
    }

    config.validate().context("invalid SNMP client configuration")?;
    Ok(config)
}

/// Merge a partial YAML mapping over an already-loaded config by
/// round-tripping through `serde_yaml::Value`: serialize the current
/// config, deep-merge the override mapping on top, then deserialize back.
fn apply_overrides(config: &mut SessionConfig, overrides: &serde_yaml::Value) -> Result<()> {
    let mut base = serde_yaml::to_value(&*config)?;
    merge(&mut base, overrides);
    *config = serde_yaml::from_value(base)?;
    Ok(())
}

fn merge(base: &mut serde_yaml::Value, overrides: &serde_yaml::Value) {
    match (base, overrides) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_merge_over_defaults() {
        let mut config = SessionConfig::default();
        let overrides: serde_yaml::Value = serde_yaml::from_str("community: private\nqueue_capacity: 10\n").unwrap();
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.community, "private");
        assert_eq!(config.queue_capacity, 10);
        // untouched fields keep their defaults
        assert_eq!(config.agent_addr, SessionConfig::default().agent_addr);
    }
}
