//! Detector trait - the entity detection collaborator

use pseudo_core::Span;

/// Trait for anything that finds entity spans in a document.
///
/// Spans may overlap, including across detectors; the rewriter resolves them.
pub trait Detector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Byte-offset spans over `text`, in any order
    fn detect(&self, text: &str) -> Vec<Span>;
}

/// Several detectors run one after the other
#[derive(Default)]
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn with(mut self, detector: impl Detector + 'static) -> Self {
        self.push(Box::new(detector));
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }
}

impl Detector for DetectorSet {
    fn name(&self) -> &str {
        "set"
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        for detector in &self.detectors {
            let found = detector.detect(text);
            tracing::debug!(detector = detector.name(), count = found.len(), "detected spans");
            spans.extend(found);
        }
        spans.sort_by_key(|s| (s.start, s.end));
        spans
    }
}
