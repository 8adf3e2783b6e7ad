use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Expand command-line inputs into text files.
///
/// Each input is a file, a directory (scanned for `.txt`/`.md` files) or a
/// glob pattern. Files whose stem already ends with `skip_suffix` are left
/// out so outputs are never pseudonymized twice.
pub fn collect_inputs(inputs: &[String], recursive: bool, skip_suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            files.extend(expand_dir(path, recursive)?);
        } else if path.is_file() {
            files.push(path.to_path_buf());
        } else if is_glob(input) {
            files.extend(expand_glob(input)?);
        } else {
            anyhow::bail!("Input does not exist: {}", input);
        }
    }

    files.retain(|f| !has_suffix(f, skip_suffix));

    // Sort for determinism
    files.sort();
    files.dedup();

    Ok(files)
}

/// `dir/name<suffix>.ext` for `input` = `.../name.ext`
pub fn output_path(input: &Path, suffix: &str, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };

    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(name)
}

fn expand_dir(path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(path).max_depth(if recursive { usize::MAX } else { 1 });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to scan {}", path.display()))?;
        if entry.file_type().is_file() && is_text(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern).with_context(|| format!("Invalid glob: {}", pattern))? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

fn is_glob(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

fn is_text(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            e.eq_ignore_ascii_case("txt")
                || e.eq_ignore_ascii_case("md")
                || e.eq_ignore_ascii_case("markdown")
        })
        .unwrap_or(false)
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    !suffix.is_empty()
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("docs/recteurs.md"), "_pseudonymise", None),
            PathBuf::from("docs/recteurs_pseudonymise.md")
        );
        assert_eq!(
            output_path(Path::new("notes"), "_x", Some(Path::new("out"))),
            PathBuf::from("out/notes_x")
        );
    }

    #[test]
    fn test_collect_dir_glob_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("b_pseudonymise.txt"), "b").unwrap();
        fs::write(root.join("image.png"), "").unwrap();
        fs::write(root.join("sub").join("c.md"), "c").unwrap();

        let root_str = root.display().to_string();
        let flat = collect_inputs(&[root_str.clone()], false, "_pseudonymise").unwrap();
        assert_eq!(flat, vec![root.join("a.md"), root.join("b.txt")]);

        let deep = collect_inputs(&[root_str.clone()], true, "_pseudonymise").unwrap();
        assert_eq!(deep.len(), 3);

        let pattern = format!("{}/**/*.md", root_str);
        let file = root.join("b.txt").display().to_string();
        let mixed = collect_inputs(&[pattern, file], false, "_pseudonymise").unwrap();
        assert_eq!(
            mixed,
            vec![root.join("a.md"), root.join("b.txt"), root.join("sub").join("c.md")]
        );
    }

    #[test]
    fn test_missing_input() {
        let err = collect_inputs(&["/nonexistent/file.txt".to_string()], false, "").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
