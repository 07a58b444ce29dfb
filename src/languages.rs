//! Language table mapping language names to Judge0 language ids

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// A language the judge service can run
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageConfig {
    /// Canonical upper-case name (e.g. "PYTHON")
    pub name: String,
    /// Judge0 language id
    pub judge0_id: u32,
    /// Human readable name (e.g. "Python")
    pub display_name: String,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    id: u32,
    display_name: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Language lookup table, keyed by lower-cased name and alias
#[derive(Debug, Clone)]
pub struct Languages {
    by_name: HashMap<String, LanguageConfig>,
    by_id: HashMap<u32, String>,
    supported: Vec<String>,
}

impl Languages {
    /// Load the table bundled with the binary
    pub fn bundled() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
        Self::from_toml(content)
    }

    /// Load the table from a TOML file on disk
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read language table {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> =
            toml::from_str(content).context("Invalid language table")?;

        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        let mut supported = Vec::with_capacity(raw_configs.len());

        for (name, raw) in raw_configs {
            let config = LanguageConfig {
                name: name.to_uppercase(),
                judge0_id: raw.id,
                display_name: raw.display_name,
            };

            if by_id.insert(raw.id, config.display_name.clone()).is_some() {
                anyhow::bail!("Duplicate judge0 id {} in language table", raw.id);
            }
            supported.push(config.name.clone());

            for alias in raw.aliases {
                by_name.insert(alias.to_lowercase(), config.clone());
            }
            by_name.insert(name.to_lowercase(), config);
        }

        supported.sort();

        Ok(Self {
            by_name,
            by_id,
            supported,
        })
    }

    /// Resolve a language name (case-insensitive) to its configuration
    pub fn resolve(&self, language: &str) -> Option<&LanguageConfig> {
        self.by_name.get(&language.trim().to_lowercase())
    }

    /// Display name for a Judge0 language id, "Unknown" if not in the table
    pub fn display_name(&self, judge0_id: u32) -> &str {
        self.by_id
            .get(&judge0_id)
            .map(String::as_str)
            .unwrap_or("Unknown")
    }

    /// Canonical names of all supported languages, sorted
    pub fn supported(&self) -> &[String] {
        &self.supported
    }
}
