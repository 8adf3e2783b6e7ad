//! Entity taxonomy, entity identity and detected spans

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize;
use crate::{CoreError, Result};

/// The fixed set of entity types the pipeline knows about.
///
/// Variant order is used as the final tie-break when two candidate spans
/// cover exactly the same range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Person,
    Org,
    Place,
    EstablishmentCode,
    StudentId,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Person,
        EntityKind::Org,
        EntityKind::Place,
        EntityKind::EstablishmentCode,
        EntityKind::StudentId,
    ];

    /// Upper-case label used in mapping tables
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "PERSON",
            EntityKind::Org => "ORG",
            EntityKind::Place => "PLACE",
            EntityKind::EstablishmentCode => "ESTABLISHMENT_CODE",
            EntityKind::StudentId => "STUDENT_ID",
        }
    }

    /// Template marker name (`{NOM}`, `{ORG}`, ...)
    pub fn marker(&self) -> &'static str {
        match self {
            EntityKind::Person => "NOM",
            EntityKind::Org => "ORG",
            EntityKind::Place => "LIEU",
            EntityKind::EstablishmentCode => "RNE",
            EntityKind::StudentId => "INE",
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.marker() == marker)
    }

    /// Token prefix when each kind has its own counter
    pub fn token_prefix(&self) -> &'static str {
        match self {
            EntityKind::Person => "PERS",
            EntityKind::Org => "ORG",
            EntityKind::Place => "LIEU",
            EntityKind::EstablishmentCode => "ETAB",
            EntityKind::StudentId => "INE",
        }
    }

    /// Identifier kinds are compared without separators or case.
    pub fn is_identifier(&self) -> bool {
        matches!(self, EntityKind::EstablishmentCode | EntityKind::StudentId)
    }

    /// Parse a label coming from a detector or an external NER model.
    ///
    /// Accepts our own labels, template markers and the usual French and
    /// CoNLL-style aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        let kind = match upper.as_str() {
            "PERSON" | "PERSONNE" | "PER" | "PERS" | "NOM" => EntityKind::Person,
            "ORG" | "ORGANISATION" | "ORGANIZATION" => EntityKind::Org,
            "PLACE" | "LIEU" | "LOC" | "GPE" | "LOCATION" => EntityKind::Place,
            "ESTABLISHMENT_CODE" | "ETABLISSEMENT" | "ÉTABLISSEMENT" | "ETAB" | "RNE" | "UAI" => {
                EntityKind::EstablishmentCode
            }
            "STUDENT_ID" | "INE" | "CODE" => EntityKind::StudentId,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s).ok_or_else(|| CoreError::Other(anyhow::anyhow!("Unknown entity kind: {}", s)))
    }
}

/// A real-world referent mentioned in text.
///
/// Identity is `(kind, canonical)`: two entities that differ only in their
/// surface form compare equal and hash identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub canonical: String,
    /// Surface form with its original casing, used when restoring text
    pub surface: String,
}

impl Entity {
    /// Build an entity from a raw surface form, canonicalizing it.
    pub fn new(kind: EntityKind, raw: &str) -> Result<Self> {
        let canonical = canonicalize(raw, kind)?;
        Ok(Self {
            kind,
            canonical,
            surface: raw.trim().to_string(),
        })
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.canonical == other.canonical
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.canonical.hash(state);
    }
}

/// A contiguous byte range of the source text attributed to one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
    /// Surface text as reported by the detector, checked against the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Span {
    pub fn new(start: usize, end: usize, kind: EntityKind) -> Self {
        Self {
            start,
            end,
            kind,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check bounds, char boundaries and the detector-reported text, returning
    /// the covered slice.
    pub fn validate<'a>(&self, text: &'a str) -> Result<&'a str> {
        if self.start >= self.end {
            return Err(CoreError::invalid_span(self.range(), "empty or inverted range"));
        }
        if self.end > text.len() {
            return Err(CoreError::invalid_span(
                self.range(),
                format!("outside document of {} bytes", text.len()),
            ));
        }
        if !text.is_char_boundary(self.start) || !text.is_char_boundary(self.end) {
            return Err(CoreError::invalid_span(self.range(), "not on a character boundary"));
        }
        let surface = &text[self.start..self.end];
        if let Some(expected) = &self.text
            && expected != surface
        {
            return Err(CoreError::invalid_span(
                self.range(),
                format!("detector text {:?} does not match document {:?}", expected, surface),
            ));
        }
        Ok(surface)
    }
}

/// Convert spans expressed in character offsets (as most NER tools report
/// them) into byte offsets over `text`.
pub fn char_spans_to_bytes(text: &str, spans: &[Span]) -> Result<Vec<Span>> {
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());

    spans
        .iter()
        .map(|span| {
            let start = boundaries.get(span.start).copied();
            let end = boundaries.get(span.end).copied();
            match (start, end) {
                (Some(start), Some(end)) => Ok(Span {
                    start,
                    end,
                    kind: span.kind,
                    text: span.text.clone(),
                }),
                _ => Err(CoreError::invalid_span(
                    span.range(),
                    format!("outside document of {} characters", boundaries.len() - 1),
                )),
            }
        })
        .collect()
}
