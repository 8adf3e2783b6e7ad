use anyhow::Context;
use pseudo_core::{
    EntityKind, MappingFormat, NumberingOrder, OverlapPolicy, RegistryConfig, Rewriter,
    TokenStyle, UnknownTokenPolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for pseudo
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub numbering: NumberingConfig,

    #[serde(default)]
    pub rewrite: RewriteConfig,

    #[serde(default)]
    pub restore: RestoreConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingStyle {
    #[default]
    Shared,
    PerKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberingConfig {
    #[serde(default)]
    pub style: NumberingStyle,

    /// Prefix of shared tokens; ignored with `per_kind`
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_start")]
    pub start: u32,

    #[serde(default)]
    pub order: NumberingOrder,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default)]
    pub overlap: OverlapPolicy,

    /// Kinds to rewrite (labels or markers); empty means all
    #[serde(default)]
    pub kinds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    #[serde(default = "default_true")]
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// RNE and INE regexes
    #[serde(default = "default_true")]
    pub builtin_identifiers: bool,

    #[serde(default)]
    pub patterns: Vec<PatternConfig>,

    /// Gazetteer term files keyed by marker (`NOM`, `ORG`, `LIEU`, ...)
    #[serde(default)]
    pub terms: BTreeMap<String, Vec<PathBuf>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub kind: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub mapping_format: MappingFormat,

    /// Appended to the input file stem for pseudonymized outputs
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            style: NumberingStyle::default(),
            prefix: default_prefix(),
            start: default_start(),
            order: NumberingOrder::default(),
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            builtin_identifiers: true,
            patterns: Vec::new(),
            terms: BTreeMap::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mapping_format: MappingFormat::default(),
            suffix: default_suffix(),
        }
    }
}

fn default_prefix() -> String {
    "ENT".to_string()
}

fn default_start() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_suffix() -> String {
    "_pseudonymise".to_string()
}

/// Parse a kind given as a label (`PERSON`, `LOC`) or a marker (`NOM`)
pub fn parse_kind(name: &str) -> anyhow::Result<EntityKind> {
    EntityKind::from_label(name).ok_or_else(|| anyhow::anyhow!("Unknown entity kind: {}", name))
}

impl NumberingConfig {
    pub fn registry_config(&self) -> anyhow::Result<RegistryConfig> {
        let style = match self.style {
            NumberingStyle::Shared => {
                if self.prefix.is_empty() || !self.prefix.chars().all(|c| c.is_ascii_uppercase()) {
                    anyhow::bail!(
                        "Token prefix must be upper-case ASCII letters, got {:?}",
                        self.prefix
                    );
                }
                TokenStyle::Shared {
                    prefix: self.prefix.clone(),
                }
            }
            NumberingStyle::PerKind => TokenStyle::PerKind,
        };

        Ok(RegistryConfig {
            style,
            start: self.start,
        })
    }
}

impl RewriteConfig {
    pub fn kinds(&self) -> anyhow::Result<Vec<EntityKind>> {
        self.kinds.iter().map(|k| parse_kind(k)).collect()
    }
}

impl RestoreConfig {
    pub fn policy(&self) -> UnknownTokenPolicy {
        if self.strict {
            UnknownTokenPolicy::Strict
        } else {
            UnknownTokenPolicy::Lenient
        }
    }
}

impl Config {
    /// Load config from default location or create default if not found
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            // Create default config file
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "pseudo", "pseudo") {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("~/.pseudo/config.toml")
        }
    }

    /// Rewriter configured with the overlap policy, numbering order and kinds
    pub fn rewriter(&self) -> anyhow::Result<Rewriter> {
        let mut rewriter = Rewriter::new()
            .with_overlap(self.rewrite.overlap)
            .with_order(self.numbering.order);

        let kinds = self.rewrite.kinds()?;
        if !kinds.is_empty() {
            rewriter = rewriter.only_kinds(kinds);
        }
        Ok(rewriter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.numbering.prefix, "ENT");
        assert_eq!(config.numbering.start, 1);
        assert_eq!(config.numbering.order, NumberingOrder::FirstSeen);
        assert_eq!(config.rewrite.overlap, OverlapPolicy::Resolve);
        assert!(config.restore.strict);
        assert!(config.detection.builtin_identifiers);
        assert_eq!(config.output.suffix, "_pseudonymise");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.numbering.prefix, config.numbering.prefix);
        assert_eq!(parsed.output.mapping_format, config.output.mapping_format);
    }

    #[test]
    fn test_partial_config() {
        let parsed: Config = toml::from_str(
            r#"
            [numbering]
            style = "per_kind"
            order = "reverse"

            [rewrite]
            overlap = "reject"
            kinds = ["NOM", "LOC"]

            [restore]
            strict = false

            [[detection.patterns]]
            kind = "PERSON"
            pattern = "Mme ([A-Z][a-z]+)"

            [detection.terms]
            ORG = ["terms/organisations.txt"]

            [output]
            mapping_format = "tsv"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.numbering.start, 1);
        assert_eq!(
            parsed.numbering.registry_config().unwrap().style,
            TokenStyle::PerKind
        );
        assert_eq!(
            parsed.rewrite.kinds().unwrap(),
            vec![EntityKind::Person, EntityKind::Place]
        );
        assert_eq!(parsed.restore.policy(), UnknownTokenPolicy::Lenient);
        assert_eq!(parsed.detection.patterns.len(), 1);
        assert_eq!(parsed.detection.terms["ORG"].len(), 1);
        assert_eq!(parsed.output.mapping_format, MappingFormat::Tsv);
        assert_eq!(parsed.output.suffix, "_pseudonymise");
    }

    #[test]
    fn test_invalid_prefix() {
        let mut config = Config::default();
        config.numbering.prefix = "ent-".to_string();
        assert!(config.numbering.registry_config().is_err());

        config.rewrite.kinds = vec!["DATE".to_string()];
        assert!(config.rewriter().is_err());
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.numbering.start = 100;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.numbering.start, 100);
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
