use lazy_static::lazy_static;
use pseudo_core::{CoreError, EntityKind, Result, Span};
use regex::Regex;

use crate::detector::Detector;

lazy_static! {
    /// INE: ten digits and a key letter, or nine digits and two letters
    static ref INE: Regex = Regex::new(r"\b(?:\d{10}[A-Za-z]|\d{9}[A-Za-z]{2})\b").unwrap();
    /// RNE / UAI establishment code: seven digits and a key letter
    static ref RNE: Regex = Regex::new(r"\b\d{7}[A-Za-z]\b").unwrap();
}

/// Regex detector for identifier-shaped entities
pub struct PatternDetector {
    patterns: Vec<(EntityKind, Regex)>,
}

impl PatternDetector {
    /// Built-in RNE and INE patterns
    pub fn new() -> Self {
        // Order matters - more specific first
        let patterns = vec![
            (EntityKind::StudentId, INE.clone()),
            (EntityKind::EstablishmentCode, RNE.clone()),
        ];

        Self { patterns }
    }

    /// A detector with no patterns at all
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Add a custom pattern. When the pattern has a capture group, the first
    /// group is the entity and the rest of the match is context.
    pub fn add_pattern(&mut self, kind: EntityKind, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern)
            .map_err(|e| CoreError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        self.patterns.push((kind, regex));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for PatternDetector {
    fn name(&self) -> &str {
        "patterns"
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();

        for (kind, pattern) in &self.patterns {
            for caps in pattern.captures_iter(text) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                if m.start() < m.end() {
                    spans.push(Span::new(m.start(), m.end(), *kind));
                }
            }
        }

        spans.sort_by_key(|s| (s.start, s.end));
        spans
    }
}
