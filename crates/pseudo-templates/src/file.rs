//! Template files
//!
//! ```text
//! # Personnes
//! {NOM} a été nommée rectrice de l'{ORG}.
//!
//! # Lieux
//! Le colloque se tient à {LIEU}.
//! ```
//!
//! `#` lines open a section, blank lines are ignored and every other line is
//! a template.

use std::path::Path;

use pseudo_core::Result;

use crate::template::Template;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Header text without the leading `#`; empty for lines before any header
    pub title: String,
    pub templates: Vec<Template>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFile {
    pub sections: Vec<Section>,
}

impl TemplateFile {
    pub fn parse(content: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();

        for line in content.lines() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }

            if let Some(header) = line.trim_start().strip_prefix('#') {
                sections.push(Section {
                    title: header.trim().to_string(),
                    templates: Vec::new(),
                });
                continue;
            }

            if sections.is_empty() {
                sections.push(Section {
                    title: String::new(),
                    templates: Vec::new(),
                });
            }
            if let Some(section) = sections.last_mut() {
                section.templates.push(Template::parse(line.trim_start()));
            }
        }

        Self { sections }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file = Self::parse(&content);
        tracing::debug!(
            path = %path.display(),
            sections = file.sections.len(),
            templates = file.len(),
            "loaded template file"
        );
        Ok(file)
    }

    /// All templates in file order
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.sections.iter().flat_map(|s| s.templates.iter())
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.templates.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pseudo_core::EntityKind;
    use std::io::Write;

    const CONTENT: &str = "\
{NOM} est en poste depuis 2020.

# Personnes
{NOM} a été nommée rectrice de l'{ORG}.
  {NOM} et {NOM} se sont rencontrés à {LIEU}.

# Identifiants
L'établissement {RNE} accueille l'élève {INE}.
#
";

    #[test]
    fn test_parse_sections() {
        let file = TemplateFile::parse(CONTENT);

        let titles: Vec<&str> = file.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["", "Personnes", "Identifiants", ""]);
        assert_eq!(file.len(), 4);

        let people = file.section("Personnes").unwrap();
        assert_eq!(people.templates.len(), 2);
        assert_eq!(
            people.templates[1].source(),
            "{NOM} et {NOM} se sont rencontrés à {LIEU}."
        );
        assert_eq!(people.templates[1].slot_count(EntityKind::Person), 2);
    }

    #[test]
    fn test_headers_are_never_templates() {
        let file = TemplateFile::parse("# {NOM}\n\n\n");
        assert!(file.is_empty());
        assert_eq!(file.sections[0].title, "{NOM}");
    }

    #[test]
    fn test_load_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(CONTENT.as_bytes()).unwrap();

        let file = TemplateFile::load(tmp.path()).unwrap();
        assert_eq!(file.templates().count(), 4);
        assert!(TemplateFile::load(Path::new("/nonexistent/templates.txt")).is_err());
    }
}
