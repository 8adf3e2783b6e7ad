use anyhow::{Context, Result};
use pseudo_config::{Config, NumberingStyle};
use pseudo_core::{
    MappingFormat, MappingTable, NumberingOrder, OverlapPolicy, Registry, RewriteStats,
    SharedRegistry,
};
use pseudo_engine::{Document, DocumentOutcome, Pipeline, collect_inputs, output_path};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{load_spans, read_text};
use crate::cli::{NumberingArgs, SpanArgs};

pub struct RunOptions {
    pub inputs: Vec<String>,
    pub spans: SpanArgs,
    pub out_dir: Option<PathBuf>,
    pub mapping: Option<PathBuf>,
    pub shared: bool,
    pub continue_from: Option<PathBuf>,
    pub recursive: bool,
    pub numbering: NumberingArgs,
    pub stats: bool,
}

pub async fn handle(mut config: Config, options: RunOptions) -> Result<()> {
    apply_overrides(&mut config, &options.numbering);
    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let suffix = config.output.suffix.clone();

    let files = collect_inputs(&options.inputs, options.recursive, &suffix)?;
    if files.is_empty() {
        anyhow::bail!("No input files found");
    }
    if options.spans.spans.is_some() && files.len() > 1 {
        anyhow::bail!("--spans applies to a single input, got {} files", files.len());
    }
    check_output_collisions(&files, &suffix, options.out_dir.as_deref())?;

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let text = read_text(file)?;
        let spans = load_spans(&options.spans, &text)?;
        documents.push(Document::new(file.display().to_string(), text).with_spans(spans));
    }

    if let Some(dir) = &options.out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let shared = options.shared || options.continue_from.is_some();
    if shared {
        run_shared(&pipeline, &config, &options, &files, documents).await
    } else {
        if options.mapping.is_some() && files.len() > 1 {
            anyhow::bail!("--mapping applies to a single input; use --shared for one table");
        }
        run_independent(&pipeline, &config, &options, &files, documents).await
    }
}

fn apply_overrides(config: &mut Config, numbering: &NumberingArgs) {
    if numbering.per_kind {
        config.numbering.style = NumberingStyle::PerKind;
    }
    if let Some(prefix) = &numbering.prefix {
        config.numbering.style = NumberingStyle::Shared;
        config.numbering.prefix = prefix.clone();
    }
    if let Some(start) = numbering.start {
        config.numbering.start = start;
    }
    if numbering.reverse {
        config.numbering.order = NumberingOrder::Reverse;
    }
    if numbering.reject_overlaps {
        config.rewrite.overlap = OverlapPolicy::Reject;
    }
    if !numbering.kinds.is_empty() {
        config.rewrite.kinds = numbering.kinds.clone();
    }
}

async fn run_independent(
    pipeline: &Arc<Pipeline>,
    config: &Config,
    options: &RunOptions,
    files: &[PathBuf],
    documents: Vec<Document>,
) -> Result<()> {
    let outcomes = Arc::clone(pipeline).process_batch(documents).await;
    let mut succeeded = 0;

    for DocumentOutcome { name, result } in outcomes {
        let file = PathBuf::from(&name);
        let processed = match result {
            Ok(processed) => processed,
            Err(e) => {
                eprintln!("✗ {}: {:#}", name, e);
                continue;
            }
        };

        let output = write_document(&file, &config.output.suffix, options, &processed.rewrite.text)?;

        let registry = processed
            .registry
            .context("independent run lost its registry")?;
        let mapping_path = match &options.mapping {
            Some(path) => path.clone(),
            None => mapping_path_for(&output, config.output.mapping_format),
        };
        save_table(&registry, Some(&processed.rewrite.text), &mapping_path)?;

        report(&name, &output, &mapping_path, &processed.rewrite.stats, options.stats);
        succeeded += 1;
    }

    finish(files.len(), succeeded)
}

async fn run_shared(
    pipeline: &Arc<Pipeline>,
    config: &Config,
    options: &RunOptions,
    files: &[PathBuf],
    documents: Vec<Document>,
) -> Result<()> {
    let registry = match &options.continue_from {
        Some(path) => {
            let table = MappingTable::load(path)
                .with_context(|| format!("Failed to load mapping table {}", path.display()))?;
            Registry::from_table(&table)?
        }
        None => pipeline.new_registry(),
    };
    let shared = SharedRegistry::new(registry);

    let outcomes = Arc::clone(pipeline)
        .process_shared(documents, shared.clone())
        .await;
    let mut succeeded = 0;

    let mapping_path = match (&options.mapping, &options.continue_from) {
        (Some(path), _) => path.clone(),
        (None, Some(previous)) => previous.clone(),
        (None, None) => {
            let dir = options
                .out_dir
                .clone()
                .or_else(|| files[0].parent().map(Path::to_path_buf))
                .unwrap_or_default();
            dir.join(format!("mapping.{}", config.output.mapping_format.extension()))
        }
    };

    for DocumentOutcome { name, result } in outcomes {
        let file = PathBuf::from(&name);
        match result {
            Ok(processed) => {
                let output =
                    write_document(&file, &config.output.suffix, options, &processed.rewrite.text)?;
                report(&name, &output, &mapping_path, &processed.rewrite.stats, options.stats);
                succeeded += 1;
            }
            Err(e) => eprintln!("✗ {}: {:#}", name, e),
        }
    }

    // Several documents share the table, so no single document hash applies
    save_table(&shared.snapshot(), None, &mapping_path)?;
    println!("✓ Shared mapping: {} ({} entities)", mapping_path.display(), shared.len());

    finish(files.len(), succeeded)
}

/// Refuse inputs whose outputs would land on the same path, as with
/// `docs/a.md` and `notes/a.md` flattened into one `--out-dir`.
fn check_output_collisions(files: &[PathBuf], suffix: &str, out_dir: Option<&Path>) -> Result<()> {
    let mut seen = HashSet::new();
    for file in files {
        let output = output_path(file, suffix, out_dir);
        if !seen.insert(output.clone()) {
            anyhow::bail!(
                "{} would overwrite another output ({}); drop --out-dir or rename the input",
                file.display(),
                output.display()
            );
        }
    }
    Ok(())
}

fn write_document(file: &Path, suffix: &str, options: &RunOptions, text: &str) -> Result<PathBuf> {
    let output = output_path(file, suffix, options.out_dir.as_deref());
    std::fs::write(&output, text).with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(output)
}

fn mapping_path_for(output: &Path, format: MappingFormat) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{}_mapping.{}", stem, format.extension()))
}

fn save_table(registry: &Registry, document: Option<&str>, path: &Path) -> Result<()> {
    let mut table = registry.to_table();
    if let Some(text) = document {
        table = table.with_document(text);
    }
    table
        .save(path)
        .with_context(|| format!("Failed to write mapping table {}", path.display()))
}

fn report(name: &str, output: &Path, mapping: &Path, stats: &RewriteStats, verbose: bool) {
    println!("✓ {} -> {}", name, output.display());
    println!(
        "  {} entities, {} token(s) created, {} reused (mapping: {})",
        stats.entities_processed,
        stats.tokens_created,
        stats.tokens_reused,
        mapping.display()
    );

    if verbose {
        for (kind, count) in &stats.by_kind {
            println!("    {}: {}", kind, count);
        }
        println!("    length: {} -> {} bytes", stats.original_len, stats.final_len);
        if stats.dropped_overlaps > 0 {
            println!("    dropped overlaps: {}", stats.dropped_overlaps);
        }
        if stats.skipped_tokens > 0 {
            println!("    already tokenized: {}", stats.skipped_tokens);
        }
    }
}

fn finish(total: usize, succeeded: usize) -> Result<()> {
    if succeeded < total {
        anyhow::bail!("{} of {} document(s) failed", total - succeeded, total);
    }
    Ok(())
}
