use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::AggregatorConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "aggregator.toml",
    "aggregator.yaml",
    "aggregator.yml",
    "aggregator.json",
];

const ENV_TEMP_DIR: &str = "AGGREGATOR_MEDIA_TEMP_DIR";
const ENV_LIBRARY_DIR: &str = "AGGREGATOR_MEDIA_LIBRARY_DIR";
const ENV_SERIALIZE_DEDUP_KEYS: &str = "AGGREGATOR_MEDIA_SERIALIZE_DEDUP_KEYS";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<AggregatorConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./aggregator.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/aggregator/aggregator.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `AggregatorConfig::default()` if no config file is found.
pub fn discover_and_load() -> AggregatorConfig {
    let mut cfg = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                AggregatorConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            AggregatorConfig::default()
        },
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// Apply `AGGREGATOR_MEDIA_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(cfg: &mut AggregatorConfig) {
    apply_env_overrides_with(cfg, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(cfg: &mut AggregatorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = lookup(ENV_TEMP_DIR).filter(|v| !v.is_empty()) {
        cfg.media.temp_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = lookup(ENV_LIBRARY_DIR).filter(|v| !v.is_empty()) {
        cfg.media.library_dir = Some(PathBuf::from(dir));
    }
    if let Some(raw) = lookup(ENV_SERIALIZE_DEDUP_KEYS) {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => cfg.media.serialize_dedup_keys = true,
            "0" | "false" | "no" | "off" => cfg.media.serialize_dedup_keys = false,
            other => warn!(
                var = ENV_SERIALIZE_DEDUP_KEYS,
                value = other,
                "ignoring unrecognized boolean override"
            ),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the user-global config directory (`~/.config/aggregator/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "aggregator").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory the media library defaults into.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "aggregator").map(|d| d.data_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<AggregatorConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_each_supported_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("aggregator.toml");
        std::fs::write(&toml_path, "[media]\nsideload_timeout_secs = 5\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().media.sideload_timeout_secs, 5);

        let yaml_path = dir.path().join("aggregator.yaml");
        std::fs::write(&yaml_path, "media:\n  browser_timeout_secs: 9\n").unwrap();
        assert_eq!(load_config(&yaml_path).unwrap().media.browser_timeout_secs, 9);

        let json_path = dir.path().join("aggregator.json");
        std::fs::write(&json_path, r#"{"metrics":{"enabled":true}}"#).unwrap();
        assert!(load_config(&json_path).unwrap().metrics.enabled);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregator.ini");
        std::fs::write(&path, "").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "ini"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/aggregator.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/aggregator.toml"));
    }

    #[test]
    fn env_overrides_replace_paths_and_flags() {
        let mut cfg = AggregatorConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            ENV_TEMP_DIR => Some("/var/tmp/agg".into()),
            ENV_SERIALIZE_DEDUP_KEYS => Some("off".into()),
            _ => None,
        });
        assert_eq!(cfg.media.temp_dir, Some(PathBuf::from("/var/tmp/agg")));
        assert_eq!(cfg.media.library_dir, None);
        assert!(!cfg.media.serialize_dedup_keys);
    }

    #[test]
    fn unrecognized_boolean_override_is_ignored() {
        let mut cfg = AggregatorConfig::default();
        apply_env_overrides_with(&mut cfg, |name| {
            (name == ENV_SERIALIZE_DEDUP_KEYS).then(|| "maybe".to_string())
        });
        assert!(cfg.media.serialize_dedup_keys);
    }
}
