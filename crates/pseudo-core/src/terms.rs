//! Term lists: one term per line, `#` starts a comment line

use std::path::Path;

use crate::Result;

/// Parse a term list, dropping blank and comment lines.
pub fn parse_term_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_term_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let terms = parse_term_list(&content);
    tracing::debug!(path = %path.display(), count = terms.len(), "loaded term list");
    Ok(terms)
}
