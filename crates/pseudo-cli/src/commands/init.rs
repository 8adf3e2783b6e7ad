use anyhow::Result;
use pseudo_config::Config;
use std::path::PathBuf;

pub fn handle(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(Config::config_path);

    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save_to(&path)?;

    println!("✓ Created {}", path.display());
    println!("  Edit [detection.terms] to add gazetteer term lists");

    Ok(())
}
