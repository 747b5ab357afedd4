//! Configuration file support for openwrite
//!
//! Reads from .openwrite/config.toml

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// API server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Manuscript export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Canvas defaults applied when a node is created without a visual style
    #[serde(default)]
    pub canvas: CanvasConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Port the API and viewer listen on
    /// Default: 8040
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Manuscript export configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// Whether compiled manuscripts include a table of contents
    /// Default: true
    #[serde(default = "default_true")]
    pub include_toc: bool,
}

/// Canvas defaults
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct CanvasConfig {
    /// Default fill color per node type (node_type -> hex color)
    #[serde(default)]
    pub default_colors: HashMap<String, String>,
}

fn default_port() -> u16 {
    8040
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { include_toc: true }
    }
}

impl Config {
    /// Load config from .openwrite/config.toml
    /// Returns default config if file doesn't exist or fails to parse
    pub fn load() -> Self {
        if let Some(path) = Self::find_config_path() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str(&contents) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".openwrite").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    /// Default canvas color for a node type, if configured
    pub fn default_color(&self, node_type: &str) -> Option<&str> {
        self.canvas.default_colors.get(node_type).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8040);
        assert!(config.export.include_toc);
        assert!(config.default_color("character").is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r##"
[server]
port = 9000

[export]
include_toc = false

[canvas.default_colors]
character = "#E0FFFF"
lore = "#DDA0DD"
"##;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.export.include_toc);
        assert_eq!(config.default_color("character"), Some("#E0FFFF"));
        assert_eq!(config.default_color("location"), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r##"
[canvas.default_colors]
plot_thread = "#FFE4B5"
"##;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8040);
        assert!(config.export.include_toc);
        assert_eq!(config.default_color("plot_thread"), Some("#FFE4B5"));
    }
}
