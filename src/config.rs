use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationColumns;
use crate::error::GraphError;
use crate::fetch::FetchSettings;
use crate::kegg::DEFAULT_BASE_URL;

pub const DEFAULT_CONFIG_FILE: &str = "kegg-graph.json";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub reaction_passes: Option<usize>,
    #[serde(default)]
    pub preamble_lines: Option<usize>,
    #[serde(default)]
    pub query_column: Option<String>,
    #[serde(default)]
    pub orthologs_column: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub threads: Option<usize>,
    pub chunk_size: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub reaction_passes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub fetch: FetchSettings,
    pub timeout: Duration,
    pub reaction_passes: usize,
    pub columns: AnnotationColumns,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch: FetchSettings::default(),
            timeout: Duration::from_secs(30),
            reaction_passes: 2,
            columns: AnnotationColumns::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, GraphError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| GraphError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| GraphError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, GraphError> {
        let defaults = ResolvedConfig::default();

        let threads = overrides
            .threads
            .or(config.threads)
            .unwrap_or(defaults.fetch.workers);
        let chunk_size = overrides
            .chunk_size
            .or(config.chunk_size)
            .unwrap_or(defaults.fetch.chunk_size);
        let timeout_secs = overrides
            .timeout_secs
            .or(config.timeout_secs)
            .unwrap_or(defaults.timeout.as_secs());
        let reaction_passes = overrides
            .reaction_passes
            .or(config.reaction_passes)
            .unwrap_or(defaults.reaction_passes);

        require_positive("threads", threads as u64)?;
        require_positive("chunk_size", chunk_size as u64)?;
        require_positive("timeout_secs", timeout_secs)?;
        require_positive("reaction_passes", reaction_passes as u64)?;

        let base_url = overrides
            .base_url
            .or(config.base_url)
            .unwrap_or(defaults.base_url);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(GraphError::InvalidConfig(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }

        let columns = AnnotationColumns {
            preamble_lines: config
                .preamble_lines
                .unwrap_or(defaults.columns.preamble_lines),
            query: config.query_column.unwrap_or(defaults.columns.query),
            orthologs: config
                .orthologs_column
                .unwrap_or(defaults.columns.orthologs),
        };

        Ok(ResolvedConfig {
            base_url,
            fetch: FetchSettings {
                chunk_size,
                workers: threads,
            },
            timeout: Duration::from_secs(timeout_secs),
            reaction_passes,
            columns,
        })
    }
}

fn require_positive(name: &str, value: u64) -> Result<(), GraphError> {
    if value == 0 {
        return Err(GraphError::InvalidConfig(format!("{name} must be at least 1")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved =
            ConfigLoader::resolve_config(Config::default(), ConfigOverrides::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.reaction_passes, 2);
        assert_eq!(resolved.fetch.chunk_size, 100);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let config: Config = serde_json::from_str(r#"{"threads": 4, "chunk_size": 10}"#).unwrap();
        let resolved = ConfigLoader::resolve_config(
            config,
            ConfigOverrides {
                threads: Some(8),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(resolved.fetch.workers, 8);
        assert_eq!(resolved.fetch.chunk_size, 10);
    }

    #[test]
    fn zero_values_are_rejected() {
        let config: Config = serde_json::from_str(r#"{"reaction_passes": 0}"#).unwrap();
        assert_matches!(
            ConfigLoader::resolve_config(config, ConfigOverrides::default()),
            Err(GraphError::InvalidConfig(_))
        );
    }
}
