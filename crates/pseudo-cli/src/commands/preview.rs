use anyhow::Result;
use pseudo_config::Config;
use pseudo_core::{MappingTable, Registry};
use pseudo_engine::Pipeline;
use std::path::PathBuf;

use super::{load_spans, read_text};
use crate::cli::SpanArgs;

pub fn handle(
    mut config: Config,
    input: PathBuf,
    spans: SpanArgs,
    mapping: Option<PathBuf>,
    kinds: Vec<String>,
    json: bool,
) -> Result<()> {
    if !kinds.is_empty() {
        config.rewrite.kinds = kinds;
    }
    let pipeline = Pipeline::from_config(&config)?;

    let text = read_text(&input)?;
    let extra = load_spans(&spans, &text)?;
    let registry = match &mapping {
        Some(path) => Registry::from_table(&MappingTable::load(path)?)?,
        None => pipeline.new_registry(),
    };

    let preview = pipeline.preview(&text, &extra, &registry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!("Preview: {}", input.display());
    println!(
        "  Entities: {} ({} new, {} reused)",
        preview.total_entities, preview.would_create, preview.would_reuse
    );
    for (kind, count) in &preview.by_kind {
        println!("    {}: {}", kind, count);
    }

    if !preview.entries.is_empty() {
        println!("\nReplacements:");
        for entry in &preview.entries {
            let token = match &entry.token {
                Some(token) => token.to_string(),
                None if entry.is_new => "(new)".to_string(),
                None => "(repeat)".to_string(),
            };
            println!(
                "  {}..{} {} {:?} -> {}",
                entry.start, entry.end, entry.kind, entry.surface, token
            );
        }
    }

    if !preview.dropped.is_empty() {
        println!("\nDropped overlapping spans ({}):", preview.dropped.len());
        for span in &preview.dropped {
            println!("  {}..{} {}", span.start, span.end, span.kind);
        }
    }

    Ok(())
}
