use anyhow::{Context, Result};
use pseudo_config::parse_kind;
use pseudo_templates::{AnnotatedSample, Bindings, CorpusGenerator, Template, TemplateFile};
use std::path::{Path, PathBuf};

use super::write_output;

pub fn handle(
    templates: PathBuf,
    bindings: Vec<String>,
    terms: Vec<String>,
    count: usize,
    section: Option<String>,
    json: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let file = TemplateFile::load(&templates)
        .with_context(|| format!("Failed to load templates {}", templates.display()))?;

    let selected: Vec<&Template> = match &section {
        Some(title) => file
            .section(title)
            .with_context(|| format!("No section named {:?}", title))?
            .templates
            .iter()
            .collect(),
        None => file.templates().collect(),
    };

    let samples = if terms.is_empty() {
        let mut fixed = Bindings::new();
        for assignment in &bindings {
            fixed.bind_assignment(assignment)?;
        }
        selected
            .iter()
            .map(|t| t.instantiate_annotated(&fixed))
            .collect::<Result<Vec<AnnotatedSample>, _>>()?
    } else {
        if !bindings.is_empty() {
            anyhow::bail!("--bind and --terms cannot be combined");
        }
        let mut generator = CorpusGenerator::new();
        for assignment in &terms {
            let (marker, path) = assignment
                .split_once('=')
                .with_context(|| format!("Expected MARKER=file, got {:?}", assignment))?;
            generator.add_pool_file(parse_kind(marker.trim())?, Path::new(path.trim()))?;
        }
        generator.generate(selected.iter().copied(), count)?
    };

    let content = if json {
        format!("{}\n", serde_json::to_string_pretty(&samples)?)
    } else {
        samples
            .iter()
            .map(|s| format!("{}\n", s.text))
            .collect::<String>()
    };

    write_output(output.as_ref(), &content)?;
    eprintln!("  {} sample(s) from {} template(s)", samples.len(), selected.len());

    Ok(())
}
