use std::sync::Arc;

use anyhow::{Context, Result};
use pseudo_config::{Config, parse_kind};
use pseudo_core::{
    Preview, Registry, RegistryConfig, Rewrite, Rewriter, SharedRegistry, Span, TokenAllocator,
};
use pseudo_detect::{Detector, DetectorSet, Gazetteer, PatternDetector};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// One input document, with spans supplied from outside (external NER)
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub name: String,
    pub text: String,
    pub spans: Vec<Span>,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            spans: Vec::new(),
        }
    }

    pub fn with_spans(mut self, spans: Vec<Span>) -> Self {
        self.spans = spans;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Processed {
    pub rewrite: Rewrite,
    /// The document's own registry; `None` when a shared registry was used
    pub registry: Option<Registry>,
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub name: String,
    pub result: Result<Processed>,
}

/// Detection followed by rewriting
pub struct Pipeline {
    detectors: DetectorSet,
    rewriter: Rewriter,
    registry_config: RegistryConfig,
}

impl Pipeline {
    pub fn new(detectors: DetectorSet, rewriter: Rewriter, registry_config: RegistryConfig) -> Self {
        Self {
            detectors,
            rewriter,
            registry_config,
        }
    }

    /// Build detectors, rewriter and numbering from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut patterns = if config.detection.builtin_identifiers {
            PatternDetector::new()
        } else {
            PatternDetector::empty()
        };
        for custom in &config.detection.patterns {
            let kind = parse_kind(&custom.kind)?;
            patterns
                .add_pattern(kind, &custom.pattern)
                .with_context(|| format!("Invalid detection pattern for {}", custom.kind))?;
        }

        let mut gazetteer = Gazetteer::new();
        for (marker, files) in &config.detection.terms {
            let kind = parse_kind(marker)?;
            for file in files {
                gazetteer
                    .add_file(kind, file)
                    .with_context(|| format!("Failed to load term list {}", file.display()))?;
            }
        }

        let mut detectors = DetectorSet::new();
        if !patterns.is_empty() {
            detectors.push(Box::new(patterns));
        }
        if !gazetteer.is_empty() {
            detectors.push(Box::new(gazetteer));
        }
        debug!(detectors = ?detectors.names(), "pipeline ready");

        Ok(Self::new(
            detectors,
            config.rewriter()?,
            config.numbering.registry_config()?,
        ))
    }

    pub fn registry_config(&self) -> &RegistryConfig {
        &self.registry_config
    }

    pub fn new_registry(&self) -> Registry {
        Registry::new(self.registry_config.clone())
    }

    /// Detected spans plus `extra`
    pub fn spans(&self, text: &str, extra: &[Span]) -> Vec<Span> {
        let mut spans = self.detectors.detect(text);
        spans.extend_from_slice(extra);
        spans
    }

    /// Pseudonymize one document with a fresh registry.
    pub fn process(&self, text: &str) -> Result<Processed> {
        let mut registry = self.new_registry();
        let rewrite = self.process_with(text, &[], &mut registry)?;
        Ok(Processed {
            rewrite,
            registry: Some(registry),
        })
    }

    /// Pseudonymize with detected and `extra` spans against `allocator`.
    pub fn process_with<A: TokenAllocator>(
        &self,
        text: &str,
        extra: &[Span],
        allocator: &mut A,
    ) -> Result<Rewrite> {
        let spans = self.spans(text, extra);
        let rewrite = self.rewriter.rewrite(text, &spans, allocator)?;
        Ok(rewrite)
    }

    pub fn preview(&self, text: &str, extra: &[Span], registry: &Registry) -> Result<Preview> {
        let spans = self.spans(text, extra);
        Ok(self.rewriter.preview(text, &spans, registry)?)
    }

    /// Process documents in parallel, each with its own registry.
    ///
    /// Outcomes come back in input order; a failing document does not
    /// affect the others.
    pub async fn process_batch(self: Arc<Self>, documents: Vec<Document>) -> Vec<DocumentOutcome> {
        let names = documents.iter().map(|d| d.name.clone()).collect();
        let mut tasks = JoinSet::new();

        for (idx, document) in documents.into_iter().enumerate() {
            let pipeline = Arc::clone(&self);
            tasks.spawn_blocking(move || {
                let mut registry = pipeline.new_registry();
                let result = pipeline
                    .process_with(&document.text, &document.spans, &mut registry)
                    .map(|rewrite| Processed {
                        rewrite,
                        registry: Some(registry),
                    });
                (idx, outcome(document.name, result))
            });
        }

        collect(names, tasks).await
    }

    /// Process documents in parallel against one registry, so the same
    /// entity gets the same token across the whole batch.
    pub async fn process_shared(
        self: Arc<Self>,
        documents: Vec<Document>,
        registry: SharedRegistry,
    ) -> Vec<DocumentOutcome> {
        let names = documents.iter().map(|d| d.name.clone()).collect();
        let mut tasks = JoinSet::new();

        for (idx, document) in documents.into_iter().enumerate() {
            let pipeline = Arc::clone(&self);
            let mut registry = registry.clone();
            tasks.spawn_blocking(move || {
                let result = pipeline
                    .process_with(&document.text, &document.spans, &mut registry)
                    .map(|rewrite| Processed {
                        rewrite,
                        registry: None,
                    });
                (idx, outcome(document.name, result))
            });
        }

        collect(names, tasks).await
    }
}

fn outcome(name: String, result: Result<Processed>) -> DocumentOutcome {
    match &result {
        Ok(processed) => info!(
            document = %name,
            entities = processed.rewrite.stats.entities_processed,
            created = processed.rewrite.stats.tokens_created,
            "document pseudonymized"
        ),
        Err(e) => info!(document = %name, error = %e, "document failed"),
    }
    DocumentOutcome { name, result }
}

/// Join every task, one outcome per input slot. A worker that panicked
/// yields an error outcome under its document's name.
async fn collect(
    names: Vec<String>,
    mut tasks: JoinSet<(usize, DocumentOutcome)>,
) -> Vec<DocumentOutcome> {
    let mut slots: Vec<Option<DocumentOutcome>> = names.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, outcome)) => slots[idx] = Some(outcome),
            Err(e) => tracing::error!(error = %e, "pseudonymization task failed"),
        }
    }

    names
        .into_iter()
        .zip(slots)
        .map(|(name, slot)| {
            slot.unwrap_or_else(|| DocumentOutcome {
                name,
                result: Err(anyhow::anyhow!("pseudonymization task panicked")),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pseudo_core::EntityKind;

    #[test]
    fn test_process_detects_identifiers() {
        let pipeline = Pipeline::from_config(&Config::default()).unwrap();
        let processed = pipeline
            .process("Lycée 0751234A, élève 1234567890A, lycée 0751234a.")
            .unwrap();

        assert_eq!(
            processed.rewrite.text,
            "Lycée ENT_0001, élève ENT_0002, lycée ENT_0001."
        );
        assert_eq!(processed.registry.unwrap().len(), 2);
    }

    #[test]
    fn test_extra_spans_merge_with_detection() {
        let pipeline = Pipeline::from_config(&Config::default()).unwrap();
        let text = "Julie Benetti dirige le 0751234A.";
        let mut registry = pipeline.new_registry();

        let rewrite = pipeline
            .process_with(text, &[Span::new(0, 13, EntityKind::Person)], &mut registry)
            .unwrap();

        assert_eq!(rewrite.text, "ENT_0001 dirige le ENT_0002.");
    }

    #[test]
    fn test_custom_patterns_from_config() {
        let mut config = Config::default();
        config.detection.builtin_identifiers = false;
        config.detection.patterns.push(pseudo_config::PatternConfig {
            kind: "NOM".to_string(),
            pattern: r"Mme ([A-Z][a-z]+)".to_string(),
        });

        let pipeline = Pipeline::from_config(&config).unwrap();
        let processed = pipeline.process("Mme Benetti, RNE 0751234A").unwrap();
        assert_eq!(processed.rewrite.text, "Mme ENT_0001, RNE 0751234A");
    }

    #[test]
    fn test_bad_config_is_rejected() {
        let mut config = Config::default();
        config.detection.patterns.push(pseudo_config::PatternConfig {
            kind: "PERSON".to_string(),
            pattern: "(".to_string(),
        });
        assert!(Pipeline::from_config(&config).is_err());
    }

    struct Tripwire;

    impl Detector for Tripwire {
        fn name(&self) -> &str {
            "tripwire"
        }

        fn detect(&self, text: &str) -> Vec<Span> {
            if text.contains("boom") {
                panic!("detector blew up");
            }
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_panicking_worker_reports_its_document() {
        let pipeline = Arc::new(Pipeline::new(
            DetectorSet::new().with(Tripwire),
            Rewriter::new(),
            RegistryConfig::default(),
        ));
        let documents = vec![
            Document::new("a.md", "boom"),
            Document::new("b.md", "Julie Benetti")
                .with_spans(vec![Span::new(0, 13, EntityKind::Person)]),
        ];

        let outcomes = pipeline.process_batch(documents).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "a.md");
        assert!(outcomes[0].result.is_err());
        assert_eq!(outcomes[1].name, "b.md");
        assert_eq!(outcomes[1].result.as_ref().unwrap().rewrite.text, "ENT_0001");
    }
}
