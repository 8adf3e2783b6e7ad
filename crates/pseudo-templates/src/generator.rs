//! Synthetic annotated corpus from templates and term pools

use std::collections::BTreeMap;
use std::path::Path;

use pseudo_core::terms::load_term_list;
use pseudo_core::{CoreError, EntityKind, Result};

use crate::template::{AnnotatedSample, Bindings, Template};

/// Fills templates from per-kind term pools.
///
/// Terms are drawn round-robin, so the output is reproducible and every term
/// of a pool shows up before any is repeated.
#[derive(Debug, Clone, Default)]
pub struct CorpusGenerator {
    pools: BTreeMap<EntityKind, Vec<String>>,
    cursors: BTreeMap<EntityKind, usize>,
}

impl CorpusGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pool<I, S>(&mut self, kind: EntityKind, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = self.pools.entry(kind).or_default();
        pool.extend(
            terms
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.trim().is_empty()),
        );
    }

    pub fn add_pool_file(&mut self, kind: EntityKind, path: &Path) -> Result<()> {
        let terms = load_term_list(path)?;
        self.add_pool(kind, terms);
        Ok(())
    }

    pub fn pool(&self, kind: EntityKind) -> &[String] {
        self.pools.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Draw values for every slot of `template`.
    pub fn bindings_for(&mut self, template: &Template) -> Result<Bindings> {
        let mut bindings = Bindings::new();

        for kind in template.kinds() {
            let pool = self.pools.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
            if pool.is_empty() {
                return Err(CoreError::MissingBinding {
                    marker: kind.marker().to_string(),
                    slot: 1,
                });
            }

            let cursor = self.cursors.entry(kind).or_insert(0);
            for _ in 0..template.slot_count(kind) {
                bindings.bind(kind, pool[*cursor % pool.len()].clone());
                *cursor += 1;
            }
        }

        Ok(bindings)
    }

    /// Instantiate each template `per_template` times.
    pub fn generate<'a, I>(&mut self, templates: I, per_template: usize) -> Result<Vec<AnnotatedSample>>
    where
        I: IntoIterator<Item = &'a Template>,
    {
        let mut samples = Vec::new();
        for template in templates {
            for _ in 0..per_template {
                let bindings = self.bindings_for(template)?;
                samples.push(template.instantiate_annotated(&bindings)?);
            }
        }

        tracing::debug!(samples = samples.len(), "generated corpus");
        Ok(samples)
    }
}
