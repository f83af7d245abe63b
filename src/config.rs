use std::fs;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::Delimiter;
use crate::error::TableError;

pub const CONFIG_FILE_NAME: &str = "kira-ti.json";
pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_INFER_SCHEMA_ROWS: usize = 100;
pub const DEFAULT_VIEW_COMMENT_PREFIX: &str = "#";

pub fn default_null_tokens() -> Vec<String> {
    ["", "NA", "N/A", "null", "NULL", "None", "NaN", "Not provided"]
        .iter()
        .map(|token| token.to_string())
        .collect()
}

/// How a delimited source is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub delimiter: Delimiter,
    pub comment_prefix: Option<String>,
    pub null_tokens: Vec<String>,
    pub infer_schema_rows: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::TAB,
            comment_prefix: None,
            null_tokens: default_null_tokens(),
            infer_schema_rows: DEFAULT_INFER_SCHEMA_ROWS,
        }
    }
}

impl ScanOptions {
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_comment_prefix(mut self, prefix: Option<String>) -> Self {
        self.comment_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn with_null_tokens(mut self, tokens: Vec<String>) -> Self {
        self.null_tokens = tokens;
        self
    }

    pub fn is_null_token(&self, raw: &str) -> bool {
        self.null_tokens.iter().any(|token| token == raw)
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub null_tokens: Option<Vec<String>>,
    #[serde(default)]
    pub infer_schema_rows: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub view_comment_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub null_tokens: Vec<String>,
    pub infer_schema_rows: usize,
    pub limit: usize,
    pub view_comment_prefix: Option<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            null_tokens: default_null_tokens(),
            infer_schema_rows: DEFAULT_INFER_SCHEMA_ROWS,
            limit: DEFAULT_LIMIT,
            view_comment_prefix: Some(DEFAULT_VIEW_COMMENT_PREFIX.to_string()),
        }
    }
}

impl ResolvedConfig {
    /// Scan options for the given delimiter and comment prefix.
    pub fn scan_options(&self, delimiter: Delimiter, comment_prefix: Option<String>) -> ScanOptions {
        ScanOptions {
            delimiter,
            comment_prefix: comment_prefix.filter(|p| !p.is_empty()),
            null_tokens: self.null_tokens.clone(),
            infer_schema_rows: self.infer_schema_rows,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path` if given, otherwise the first of `./kira-ti.json` and the
    /// per-user config file that exists. No file at all means built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, TableError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => match Self::discover() {
                Some(found) => found,
                None => return Ok(ResolvedConfig::default()),
            },
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| TableError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| TableError::ConfigParse(err.to_string()))?;
        tracing::debug!(path = %config_path, "loaded config");

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, TableError> {
        let defaults = ResolvedConfig::default();
        let infer_schema_rows = config
            .infer_schema_rows
            .unwrap_or(defaults.infer_schema_rows);
        if infer_schema_rows == 0 {
            return Err(TableError::ConfigParse(
                "infer_schema_rows must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            null_tokens: config.null_tokens.unwrap_or(defaults.null_tokens),
            infer_schema_rows,
            limit: config.limit.unwrap_or(defaults.limit),
            view_comment_prefix: match config.view_comment_prefix {
                Some(prefix) if prefix.is_empty() => None,
                Some(prefix) => Some(prefix),
                None => defaults.view_comment_prefix,
            },
        })
    }

    fn discover() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.config_dir()
                        .join("kira-table-inspector")
                        .join("config.json"),
                )
                .ok()
            })
            .filter(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.null_tokens.len(), 8);
        assert_eq!(resolved.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn empty_comment_prefix_disables_skipping() {
        let config = Config {
            view_comment_prefix: Some(String::new()),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.view_comment_prefix, None);
    }
}
