use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;
use pseudo_core::{CoreError, EntityKind, Result, Span};
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref MARKER: Regex = Regex::new(r"\{([A-Za-z]+)\}").unwrap();
}

/// A piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// The `index`-th occurrence (0-based) of a marker in the template
    Slot { kind: EntityKind, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template. Braced words that are not entity markers
    /// (`{DATE}`, `{x}`) stay literal.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut seen: HashMap<EntityKind, usize> = HashMap::new();
        let mut literal = String::new();
        let mut cursor = 0;

        for caps in MARKER.captures_iter(source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some(kind) = EntityKind::from_marker(name.as_str()) else {
                continue;
            };

            literal.push_str(&source[cursor..whole.start()]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let index = seen.entry(kind).or_insert(0);
            segments.push(Segment::Slot {
                kind,
                index: *index,
            });
            *index += 1;
            cursor = whole.end();
        }

        literal.push_str(&source[cursor..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of `kind` markers in the template
    pub fn slot_count(&self, kind: EntityKind) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Slot { kind: k, .. } if *k == kind))
            .count()
    }

    /// Kinds referenced by at least one marker
    pub fn kinds(&self) -> BTreeSet<EntityKind> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Slot { kind, .. } => Some(*kind),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn instantiate(&self, bindings: &Bindings) -> Result<String> {
        Ok(self.instantiate_annotated(bindings)?.text)
    }

    /// Fill every slot and record the byte span each value occupies.
    pub fn instantiate_annotated(&self, bindings: &Bindings) -> Result<AnnotatedSample> {
        let mut text = String::with_capacity(self.source.len());
        let mut entities = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Slot { kind, index } => {
                    let value =
                        bindings
                            .value(*kind, *index)
                            .ok_or_else(|| CoreError::MissingBinding {
                                marker: kind.marker().to_string(),
                                slot: index + 1,
                            })?;
                    let start = text.len();
                    text.push_str(value);
                    entities.push(Span::new(start, text.len(), *kind).with_text(value));
                }
            }
        }

        Ok(AnnotatedSample { text, entities })
    }
}

/// Parse and fill a template in one go.
pub fn instantiate(template: &str, bindings: &Bindings) -> Result<String> {
    Template::parse(template).instantiate(bindings)
}

/// Values bound to each marker
///
/// Slot *i* of a marker takes the *i*-th value. A marker bound to a single
/// value reuses it for every slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: HashMap<EntityKind, Vec<String>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for the next slot of `kind`.
    pub fn bind(&mut self, kind: EntityKind, value: impl Into<String>) -> &mut Self {
        self.values.entry(kind).or_default().push(value.into());
        self
    }

    pub fn with(mut self, kind: EntityKind, value: impl Into<String>) -> Self {
        self.bind(kind, value);
        self
    }

    /// Bind from a `MARKER=value` assignment, as given on the command line.
    pub fn bind_assignment(&mut self, assignment: &str) -> Result<&mut Self> {
        let Some((marker, value)) = assignment.split_once('=') else {
            return Err(CoreError::Other(anyhow::anyhow!(
                "Expected MARKER=value, got {:?}",
                assignment
            )));
        };
        let marker = marker.trim().trim_start_matches('{').trim_end_matches('}');
        let kind = EntityKind::from_marker(&marker.to_uppercase()).ok_or_else(|| {
            CoreError::Other(anyhow::anyhow!("Unknown marker: {}", marker))
        })?;
        Ok(self.bind(kind, value.trim()))
    }

    pub fn values(&self, kind: EntityKind) -> &[String] {
        self.values.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Value for slot `index` (0-based) of `kind`
    pub fn value(&self, kind: EntityKind, index: usize) -> Option<&str> {
        match self.values(kind) {
            [single] => Some(single.as_str()),
            values => values.get(index).map(String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(Vec::is_empty)
    }
}

/// A filled template together with the spans of its entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSample {
    pub text: String,
    pub entities: Vec<Span>,
}
