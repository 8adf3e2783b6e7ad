//! Gazetteer detector - known names, organizations and places from term lists

use std::collections::BTreeMap;
use std::path::Path;

use pseudo_core::terms::load_term_list;
use pseudo_core::{CoreError, EntityKind, Result, Span};
use regex::Regex;

use crate::detector::Detector;

/// Case-insensitive whole-word matcher over term lists, one per kind
#[derive(Default)]
pub struct Gazetteer {
    terms: BTreeMap<EntityKind, Vec<String>>,
    compiled: Vec<(EntityKind, Regex)>,
}

impl Gazetteer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add terms for `kind` and recompile its matcher.
    pub fn add_terms<I, S>(&mut self, kind: EntityKind, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.terms.entry(kind).or_default();
        for term in terms {
            let term: String = term.into();
            let term = term.trim();
            if !term.is_empty() && !list.iter().any(|t| t.as_str() == term) {
                list.push(term.to_string());
            }
        }
        self.recompile(kind)
    }

    /// Load a term list file (one term per line) for `kind`.
    pub fn add_file(&mut self, kind: EntityKind, path: &Path) -> Result<()> {
        let terms = load_term_list(path)?;
        self.add_terms(kind, terms)
    }

    /// Number of terms across all kinds
    pub fn len(&self) -> usize {
        self.terms.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn recompile(&mut self, kind: EntityKind) -> Result<()> {
        self.compiled.retain(|(k, _)| *k != kind);

        let Some(terms) = self.terms.get(&kind) else {
            return Ok(());
        };
        if terms.is_empty() {
            return Ok(());
        }

        // Longest alternatives first so "Académie de Paris" beats "Paris"
        let mut sorted: Vec<&String> = terms.iter().collect();
        sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let alternatives: Vec<String> = sorted.iter().map(|t| term_pattern(t)).collect();
        let pattern = format!("(?i)(?:{})", alternatives.join("|"));
        let regex =
            Regex::new(&pattern).map_err(|e| CoreError::InvalidPattern(format!("{}: {}", kind, e)))?;

        self.compiled.push((kind, regex));
        self.compiled.sort_by_key(|(k, _)| *k);
        Ok(())
    }
}

/// Escaped term, tolerant to line breaks between words, anchored on word
/// boundaries where the term starts or ends with a word character.
fn term_pattern(term: &str) -> String {
    let body = term
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");

    let starts_word = term.chars().next().is_some_and(char::is_alphanumeric);
    let ends_word = term.chars().last().is_some_and(char::is_alphanumeric);

    format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        body,
        if ends_word { r"\b" } else { "" }
    )
}

impl Detector for Gazetteer {
    fn name(&self) -> &str {
        "gazetteer"
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        let mut spans: Vec<Span> = self
            .compiled
            .iter()
            .flat_map(|(kind, regex)| {
                regex
                    .find_iter(text)
                    .map(move |m| Span::new(m.start(), m.end(), *kind))
            })
            .collect();
        spans.sort_by_key(|s| (s.start, s.end));
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn surfaces<'a>(text: &'a str, spans: &[Span]) -> Vec<&'a str> {
        spans.iter().map(|s| &text[s.start..s.end]).collect()
    }

    #[test]
    fn test_case_insensitive_whole_words() {
        let mut gazetteer = Gazetteer::new();
        gazetteer
            .add_terms(EntityKind::Person, ["Julie Benetti"])
            .unwrap();

        let text = "JULIE BENETTI puis julie\nbenetti, mais pas Julie Benettis.";
        let spans = gazetteer.detect(text);

        assert_eq!(surfaces(text, &spans), vec!["JULIE BENETTI", "julie\nbenetti"]);
    }

    #[test]
    fn test_longest_term_first() {
        let mut gazetteer = Gazetteer::new();
        gazetteer
            .add_terms(EntityKind::Org, ["Académie", "Académie de Paris"])
            .unwrap();
        gazetteer.add_terms(EntityKind::Place, ["Paris"]).unwrap();

        let text = "l'Académie de Paris";
        let spans = gazetteer.detect(text);

        // The org match wins within its regex; the place still overlaps it
        assert_eq!(surfaces(text, &spans), vec!["Académie de Paris", "Paris"]);
        assert_eq!(spans[0].kind, EntityKind::Org);
    }

    #[test]
    fn test_terms_with_punctuation() {
        let mut gazetteer = Gazetteer::new();
        gazetteer.add_terms(EntityKind::Org, ["Sciences Po."]).unwrap();

        let text = "Diplômée de Sciences Po. en 1998";
        let spans = gazetteer.detect(text);
        assert_eq!(surfaces(text, &spans), vec!["Sciences Po."]);
    }

    #[test]
    fn test_load_file_and_dedup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# Lieux\nCréteil\nVersailles\n\nCréteil").unwrap();

        let mut gazetteer = Gazetteer::new();
        gazetteer.add_file(EntityKind::Place, file.path()).unwrap();
        assert_eq!(gazetteer.len(), 2);

        let text = "De Versailles à Créteil.";
        assert_eq!(surfaces(text, &gazetteer.detect(text)), vec!["Versailles", "Créteil"]);
    }

    #[test]
    fn test_empty_gazetteer() {
        let gazetteer = Gazetteer::new();
        assert!(gazetteer.is_empty());
        assert!(gazetteer.detect("Paris").is_empty());
    }
}
