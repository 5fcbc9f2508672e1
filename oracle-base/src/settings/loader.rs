use std::env;
use std::path::PathBuf;

use config::{Config, Environment, File};
use eyre::{Context, Result};
use serde::de::DeserializeOwned;

/// Load a settings object from the config locations.
/// Further documentation can be found in the `settings` module.
pub fn load_settings_object<T>(env_prefix: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut base_config_sources = vec![];
    let mut builder = Config::builder();

    // Load the default config files (`./config/*.json`) when present
    if let Ok(entries) = PathBuf::from("./config").read_dir() {
        let mut paths = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect::<Vec<_>>();
        paths.sort();
        for path in paths {
            base_config_sources.push(format!("{:?}", path));
            builder = builder.add_source(File::from(path));
        }
    }

    // Load a set of additional user specified config files
    let config_file_paths: Vec<String> = env::var("CONFIG_FILES")
        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let builder = config_file_paths
        .iter()
        .filter(|path| !path.is_empty())
        .fold(builder, |builder, path| builder.add_source(File::with_name(path)));

    let config = builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut result = config
        .try_deserialize::<T>()
        .context("Failed to deserialize settings");
    for cfg_path in base_config_sources.iter().chain(config_file_paths.iter()) {
        result = result.with_context(|| format!("Config loaded: {cfg_path}"));
    }
    result
}
