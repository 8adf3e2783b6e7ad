//! Restore pseudonymized text from a registry

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::registry::Registry;
use crate::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTokenPolicy {
    /// Fail on the first token the registry never allocated
    #[default]
    Strict,
    /// Leave unknown tokens in place and report them
    Lenient,
}

#[derive(Debug, Clone)]
pub struct Restored {
    pub text: String,
    pub replacements: usize,
    /// Unknown tokens left as-is (lenient mode), with their byte offsets
    pub unknown: Vec<(String, usize)>,
}

/// Replace every token of `text` with the surface form of its entity.
///
/// Known tokens are matched literally, longest first, wherever they occur:
/// a token may sit against letters or digits that followed the original
/// span (`ENT_0001XV`, `ENT_00012024`). Anything else shaped like a token
/// with one of the registry's prefixes is unknown. Other upper-case
/// identifiers such as `COVID_19` pass through.
pub fn restore(text: &str, registry: &Registry, policy: UnknownTokenPolicy) -> Result<Restored> {
    let known: HashMap<String, &Entity> = registry
        .iter()
        .map(|m| (m.token.to_string(), &m.entity))
        .collect();
    let Some(scanner) = scanner(&known, &registry.prefixes())? else {
        return Ok(Restored {
            text: text.to_string(),
            replacements: 0,
            unknown: Vec::new(),
        });
    };

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut replacements = 0;
    let mut unknown = Vec::new();

    for m in scanner.find_iter(text) {
        match known.get(m.as_str()) {
            Some(entity) => {
                out.push_str(&text[cursor..m.start()]);
                out.push_str(&entity.surface);
                cursor = m.end();
                replacements += 1;
            }
            None => match policy {
                UnknownTokenPolicy::Strict => {
                    return Err(CoreError::UnknownToken {
                        token: m.as_str().to_string(),
                        offset: Some(m.start()),
                    });
                }
                UnknownTokenPolicy::Lenient => {
                    tracing::warn!(token = m.as_str(), offset = m.start(), "unknown token left in place");
                    unknown.push((m.as_str().to_string(), m.start()));
                }
            },
        }
    }
    out.push_str(&text[cursor..]);

    Ok(Restored {
        text: out,
        replacements,
        unknown,
    })
}

/// Known tokens first (longest wins at a given position, so `ENT_0001_2`
/// beats `ENT_0001`), then any token shape using a registry prefix.
fn scanner(known: &HashMap<String, &Entity>, prefixes: &[String]) -> Result<Option<Regex>> {
    if prefixes.is_empty() {
        return Ok(None);
    }

    let mut tokens: Vec<&str> = known.keys().map(String::as_str).collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut alternatives: Vec<String> = tokens.into_iter().map(regex::escape).collect();
    let prefixes: Vec<String> = prefixes.iter().map(|p| regex::escape(p)).collect();
    alternatives.push(format!(r"(?:{})_\d+(?:_\d+)?", prefixes.join("|")));

    let regex = Regex::new(&alternatives.join("|"))
        .map_err(|e| CoreError::InvalidPattern(format!("token scanner: {}", e)))?;
    Ok(Some(regex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Span};
    use crate::rewrite::pseudonymize;

    #[test]
    fn test_restore_round_trip() {
        let text = "Julie Benetti dirige l'Académie de Paris (RNE 0751234A).";
        let spans = vec![
            Span::new(0, 13, EntityKind::Person),
            Span::new(23, 41, EntityKind::Org),
            Span::new(47, 55, EntityKind::EstablishmentCode),
        ];
        let (pseudo, registry) = pseudonymize(text, &spans).unwrap();
        assert_eq!(pseudo, "ENT_0001 dirige l'ENT_0002 (RNE ENT_0003).");

        let restored = restore(&pseudo, &registry, UnknownTokenPolicy::Strict).unwrap();
        assert_eq!(restored.text, text);
        assert_eq!(restored.replacements, 3);
    }

    #[test]
    fn test_unknown_token_strict_and_lenient() {
        let text = "Julie Benetti";
        let (_, registry) = pseudonymize(text, &[Span::new(0, 13, EntityKind::Person)]).unwrap();

        let foreign = "ENT_0001 et ENT_0042";
        let err = restore(foreign, &registry, UnknownTokenPolicy::Strict).unwrap_err();
        match err {
            CoreError::UnknownToken { token, offset } => {
                assert_eq!(token, "ENT_0042");
                assert_eq!(offset, Some(12));
            }
            other => panic!("unexpected error: {other}"),
        }

        let restored = restore(foreign, &registry, UnknownTokenPolicy::Lenient).unwrap();
        assert_eq!(restored.text, "Julie Benetti et ENT_0042");
        assert_eq!(restored.unknown, vec![("ENT_0042".to_string(), 12)]);
    }

    #[test]
    fn test_foreign_prefixes_pass_through() {
        let (_, registry) =
            pseudonymize("Julie Benetti", &[Span::new(0, 13, EntityKind::Person)]).unwrap();
        let text = "Plan COVID_19 pour ENT_0001";
        let restored = restore(text, &registry, UnknownTokenPolicy::Strict).unwrap();
        assert_eq!(restored.text, "Plan COVID_19 pour Julie Benetti");
    }

    #[test]
    fn test_variant_falls_back_to_base() {
        let (_, registry) =
            pseudonymize("Julie Benetti", &[Span::new(0, 13, EntityKind::Person)]).unwrap();
        let restored = restore("ENT_0001_2", &registry, UnknownTokenPolicy::Strict).unwrap();
        assert_eq!(restored.text, "Julie Benetti_2");
    }

    #[test]
    fn test_tokens_glued_to_following_text() {
        let text = "Congrès ParisXV, puis Paris2024.";
        let spans = vec![
            Span::new(9, 14, EntityKind::Place),
            Span::new(23, 28, EntityKind::Place),
        ];
        let (pseudo, registry) = pseudonymize(text, &spans).unwrap();
        assert_eq!(pseudo, "Congrès ENT_0001XV, puis ENT_00012024.");

        let restored = restore(&pseudo, &registry, UnknownTokenPolicy::Strict).unwrap();
        assert_eq!(restored.text, text);
        assert_eq!(restored.replacements, 2);
    }

    #[test]
    fn test_glued_unknown_token_is_rejected() {
        let (_, registry) =
            pseudonymize("Julie Benetti", &[Span::new(0, 13, EntityKind::Person)]).unwrap();

        let err = restore("voir ENT_0042XV", &registry, UnknownTokenPolicy::Strict).unwrap_err();
        assert!(matches!(err, CoreError::UnknownToken { ref token, offset: Some(5) } if token == "ENT_0042"));

        let restored = restore("voir ENT_0042XV", &registry, UnknownTokenPolicy::Lenient).unwrap();
        assert_eq!(restored.text, "voir ENT_0042XV");
        assert_eq!(restored.unknown, vec![("ENT_0042".to_string(), 5)]);
    }
}
