//! Spans produced by an external NER tool, exchanged as JSON
//!
//! Accepted shapes: a bare array of entities, or an object with an
//! `entities` (or spaCy-style `ents`) array. Each entity carries `start`,
//! `end`, a `label` (alias `kind` / `type`) and optionally its `text`.

use std::str::FromStr;

use pseudo_core::{CoreError, EntityKind, Result, Span, char_spans_to_bytes};
use serde::{Deserialize, Serialize};

/// Unit of the offsets reported by the external tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    #[default]
    Bytes,
    Chars,
}

impl FromStr for OffsetUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bytes" | "byte" => Ok(OffsetUnit::Bytes),
            "chars" | "char" | "characters" => Ok(OffsetUnit::Chars),
            other => Err(CoreError::Other(anyhow::anyhow!("Unknown offset unit: {}", other))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExternalEntity {
    start: usize,
    end: usize,
    #[serde(alias = "kind", alias = "type")]
    label: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExternalDocument {
    List(Vec<ExternalEntity>),
    Wrapped {
        #[serde(alias = "ents")]
        entities: Vec<ExternalEntity>,
    },
}

/// Parse external spans into byte-offset spans over `text`.
///
/// Labels outside the taxonomy (dates, misc...) are skipped.
pub fn parse_external_spans(json: &str, text: &str, unit: OffsetUnit) -> Result<Vec<Span>> {
    let entities = match serde_json::from_str::<ExternalDocument>(json)? {
        ExternalDocument::List(entities) => entities,
        ExternalDocument::Wrapped { entities } => entities,
    };

    let mut spans = Vec::with_capacity(entities.len());
    for entity in entities {
        let Some(kind) = EntityKind::from_label(&entity.label) else {
            tracing::debug!(label = %entity.label, "skipping label outside the taxonomy");
            continue;
        };
        spans.push(Span {
            start: entity.start,
            end: entity.end,
            kind,
            text: entity.text,
        });
    }

    match unit {
        OffsetUnit::Bytes => Ok(spans),
        OffsetUnit::Chars => char_spans_to_bytes(text, &spans),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Zoé Lefèvre vit à Créteil.";

    #[test]
    fn test_char_offsets_from_wrapped_document() {
        let json = r#"{"ents": [
            {"start": 0, "end": 11, "label": "PERSONNE", "text": "Zoé Lefèvre"},
            {"start": 18, "end": 25, "label": "LOC"},
            {"start": 0, "end": 3, "label": "DATE"}
        ]}"#;

        let spans = parse_external_spans(json, TEXT, OffsetUnit::Chars).unwrap();

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind, EntityKind::Person);
        assert_eq!(spans[0].validate(TEXT).unwrap(), "Zoé Lefèvre");
        assert_eq!(spans[1].kind, EntityKind::Place);
        assert_eq!(spans[1].validate(TEXT).unwrap(), "Créteil");
    }

    #[test]
    fn test_byte_offsets_from_list() {
        let json = r#"[{"start": 21, "end": 29, "kind": "PLACE"}]"#;
        let spans = parse_external_spans(json, TEXT, OffsetUnit::Bytes).unwrap();
        assert_eq!(spans[0].validate(TEXT).unwrap(), "Créteil");
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_external_spans("{\"nope\": 1}", TEXT, OffsetUnit::Bytes).unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
        assert!("lines".parse::<OffsetUnit>().is_err());
    }
}
