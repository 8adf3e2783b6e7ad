//! Surface form normalization
//!
//! Canonical forms decide entity identity: every mention that a reader would
//! take for the same entity (case variants, extra whitespace, a trailing
//! comma picked up by the detector) must collapse to the same string.

use crate::entity::EntityKind;
use crate::{CoreError, Result};

/// Normalize a raw surface form for identity comparison.
///
/// Fails with `InvalidSpan` when nothing meaningful is left.
pub fn canonicalize(raw: &str, kind: EntityKind) -> Result<String> {
    let folded = fold_whitespace(&normalize_typography(raw));
    let stripped = folded.trim_matches(is_edge_char);

    if stripped.is_empty() {
        return Err(CoreError::InvalidSpan {
            range: None,
            reason: format!("no entity text in {:?}", raw),
        });
    }

    let canonical = if kind.is_identifier() {
        stripped
            .chars()
            .filter(|c| !is_identifier_separator(*c))
            .flat_map(char::to_uppercase)
            .collect::<String>()
    } else {
        stripped.to_lowercase()
    };

    if canonical.is_empty() {
        return Err(CoreError::InvalidSpan {
            range: None,
            reason: format!("identifier {:?} has no characters", raw),
        });
    }

    Ok(canonical)
}

/// Collapse every whitespace run (newlines and NBSP included) to one space.
fn fold_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_typography(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '\u{02BC}' => '\'',
            '\u{2010}' | '\u{2011}' => '-',
            // Narrow and regular no-break spaces
            '\u{202F}' | '\u{00A0}' => ' ',
            other => other,
        })
        .collect()
}

fn is_edge_char(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | ','
                | ';'
                | ':'
                | '!'
                | '?'
                | '"'
                | '\''
                | '('
                | ')'
                | '['
                | ']'
                | '{'
                | '}'
                | '*'
                | '«'
                | '»'
                | '“'
                | '”'
                | '…'
                | '–'
                | '—'
                | '-'
        )
}

fn is_identifier_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '.' | '_' | '/')
}
