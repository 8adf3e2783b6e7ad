pub mod init;
pub mod instantiate;
pub mod preview;
pub mod restore;
pub mod run;

use anyhow::{Context, Result};
use pseudo_config::Config;
use pseudo_core::Span;
use pseudo_detect::{OffsetUnit, parse_external_spans};
use std::path::{Path, PathBuf};

use crate::cli::SpanArgs;

/// Explicit config file, or the user config (created on first use)
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Read a UTF-8 document
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))
}

/// External spans for `text`, if `--spans` was given
pub fn load_spans(args: &SpanArgs, text: &str) -> Result<Vec<Span>> {
    let Some(path) = &args.spans else {
        return Ok(Vec::new());
    };
    let unit: OffsetUnit = args.offsets.parse()?;
    let json = read_text(path)?;
    let spans = parse_external_spans(&json, text, unit)
        .with_context(|| format!("Invalid spans file {}", path.display()))?;
    Ok(spans)
}

/// Write to `output`, or stdout when absent
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✓ Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
