use anyhow::{Context, Result};
use pseudo_config::Config;
use pseudo_core::{MappingTable, Registry, UnknownTokenPolicy, restore};
use std::path::PathBuf;

use super::{read_text, write_output};

pub fn handle(
    config: &Config,
    input: PathBuf,
    mapping: PathBuf,
    output: Option<PathBuf>,
    lenient: bool,
) -> Result<()> {
    let text = read_text(&input)?;
    let table = MappingTable::load(&mapping)
        .with_context(|| format!("Failed to load mapping table {}", mapping.display()))?;

    if !table.matches_document(&text) {
        tracing::warn!(
            input = %input.display(),
            mapping = %mapping.display(),
            "document changed since the mapping table was written"
        );
    }

    let registry = Registry::from_table(&table)?;
    let policy = if lenient {
        UnknownTokenPolicy::Lenient
    } else {
        config.restore.policy()
    };

    let restored = restore(&text, &registry, policy)
        .with_context(|| format!("Failed to restore {}", input.display()))?;

    write_output(output.as_ref(), &restored.text)?;

    eprintln!("  Restored {} token(s)", restored.replacements);
    if !restored.unknown.is_empty() {
        eprintln!("  Unknown tokens left in place ({}):", restored.unknown.len());
        for (token, offset) in &restored.unknown {
            eprintln!("    {} at byte {}", token, offset);
        }
    }

    Ok(())
}
