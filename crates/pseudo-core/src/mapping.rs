//! Mapping table - the persisted form of a registry
//!
//! Two formats: pretty JSON (the default, keeps counters and metadata) and a
//! line-delimited TSV with a `#` comment header for quick inspection.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::entity::EntityKind;
use crate::registry::{RegistryConfig, TokenStyle};
use crate::token::Token;
use crate::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingTable {
    pub metadata: TableMetadata,
    pub entries: Vec<MappingEntry>,
    /// Next number per token prefix
    #[serde(default)]
    pub counters: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub session_id: String,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
    pub numbering: RegistryConfig,
    pub total: usize,
    /// blake3 of the pseudonymized text this table belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<String>,
}

impl TableMetadata {
    pub fn new(numbering: RegistryConfig, total: usize) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            created_at: OffsetDateTime::now_utc(),
            numbering,
            total,
            document_hash: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub token: Token,
    pub kind: EntityKind,
    pub canonical: String,
    pub surface: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingFormat {
    #[default]
    Json,
    Tsv,
}

impl MappingFormat {
    /// Pick a format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => MappingFormat::Tsv,
            _ => MappingFormat::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MappingFormat::Json => "json",
            MappingFormat::Tsv => "tsv",
        }
    }
}

impl FromStr for MappingFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(MappingFormat::Json),
            "tsv" => Ok(MappingFormat::Tsv),
            other => Err(CoreError::Other(anyhow::anyhow!(
                "Unknown mapping format: {}",
                other
            ))),
        }
    }
}

impl MappingTable {
    /// Record the hash of the pseudonymized text the table was produced with.
    pub fn with_document(mut self, pseudonymized: &str) -> Self {
        self.metadata.document_hash = Some(hash_text(pseudonymized));
        self
    }

    /// True when no hash was recorded or `pseudonymized` matches it.
    pub fn matches_document(&self, pseudonymized: &str) -> bool {
        match &self.metadata.document_hash {
            Some(hash) => *hash == hash_text(pseudonymized),
            None => true,
        }
    }

    pub fn encode(&self, format: MappingFormat) -> Result<String> {
        match format {
            MappingFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            MappingFormat::Tsv => Ok(self.to_tsv()),
        }
    }

    pub fn decode(content: &str, format: MappingFormat) -> Result<Self> {
        match format {
            MappingFormat::Json => Ok(serde_json::from_str(content)?),
            MappingFormat::Tsv => Self::from_tsv(content),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.encode(MappingFormat::from_path(path))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::decode(&content, MappingFormat::from_path(path))
    }

    fn to_tsv(&self) -> String {
        let mut out = String::new();
        out.push_str("# pseudo mapping table\n");
        out.push_str(&format!("# session_id: {}\n", self.metadata.session_id));
        out.push_str(&format!(
            "# created_at: {}\n",
            self.metadata.created_at.unix_timestamp()
        ));
        match &self.metadata.numbering.style {
            TokenStyle::Shared { prefix } => out.push_str(&format!("# prefix: {}\n", prefix)),
            TokenStyle::PerKind => out.push_str("# prefix: per_kind\n"),
        }
        out.push_str(&format!("# start: {}\n", self.metadata.numbering.start));
        if let Some(hash) = &self.metadata.document_hash {
            out.push_str(&format!("# document_hash: {}\n", hash));
        }
        out.push_str("token\tkind\tcanonical\tsurface\n");
        for entry in &self.entries {
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                entry.token,
                entry.kind,
                escape(&entry.canonical),
                escape(&entry.surface)
            ));
        }
        out
    }

    fn from_tsv(content: &str) -> Result<Self> {
        let mut metadata = TableMetadata::new(RegistryConfig::default(), 0);
        let mut entries = Vec::new();

        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if let Some((key, value)) = comment.split_once(':') {
                    apply_header(&mut metadata, key.trim(), value.trim())?;
                }
                continue;
            }
            if line.starts_with("token\t") {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 4 {
                return Err(CoreError::CorruptTable(format!(
                    "line {}: expected 4 tab-separated fields, found {}",
                    lineno + 1,
                    fields.len()
                )));
            }
            let token: Token = fields[0].parse()?;
            let kind = EntityKind::from_label(fields[1]).ok_or_else(|| {
                CoreError::CorruptTable(format!("line {}: unknown kind {}", lineno + 1, fields[1]))
            })?;
            entries.push(MappingEntry {
                token,
                kind,
                canonical: unescape(fields[2]),
                surface: unescape(fields[3]),
            });
        }

        metadata.total = entries.len();
        Ok(Self {
            metadata,
            entries,
            counters: BTreeMap::new(),
        })
    }
}

fn apply_header(metadata: &mut TableMetadata, key: &str, value: &str) -> Result<()> {
    let bad = |what: &str| CoreError::CorruptTable(format!("bad {} header: {}", what, value));
    match key {
        "session_id" => metadata.session_id = value.to_string(),
        "created_at" => {
            let ts: i64 = value.parse().map_err(|_| bad("created_at"))?;
            metadata.created_at =
                OffsetDateTime::from_unix_timestamp(ts).map_err(|_| bad("created_at"))?;
        }
        "prefix" => {
            metadata.numbering.style = if value == "per_kind" {
                TokenStyle::PerKind
            } else {
                TokenStyle::Shared {
                    prefix: value.to_string(),
                }
            }
        }
        "start" => metadata.numbering.start = value.parse().map_err(|_| bad("start"))?,
        "document_hash" => metadata.document_hash = Some(value.to_string()),
        _ => {}
    }
    Ok(())
}

fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
