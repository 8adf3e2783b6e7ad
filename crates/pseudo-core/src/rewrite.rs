//! Rewriter - replaces entity spans with registry tokens
//!
//! Everything outside an accepted span is copied through byte for byte.
//! Spans are validated, de-overlapped and canonicalized before the first
//! token is allocated, so a failing document leaves the registry untouched.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, Span};
use crate::registry::{Registry, RegistryConfig, TokenAllocator};
use crate::token::Token;
use crate::{CoreError, Result};

/// What to do when two detected spans share characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Longest span wins, ties go to the earliest start, then to kind order
    #[default]
    Resolve,
    /// Fail with `OverlappingSpans`
    Reject,
}

/// Order in which first occurrences receive their numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingOrder {
    /// Ascending ids in reading order
    #[default]
    FirstSeen,
    /// Allocation runs right to left, so ids decrease with document position
    Reverse,
}

#[derive(Debug, Clone, Default)]
pub struct Rewriter {
    overlap: OverlapPolicy,
    order: NumberingOrder,
    kinds: Option<HashSet<EntityKind>>,
}

/// One replaced span
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
    pub surface: String,
    pub token: Token,
    /// False when the token was already known to the registry
    pub created: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteStats {
    pub original_len: usize,
    pub final_len: usize,
    pub entities_processed: usize,
    pub tokens_created: usize,
    pub tokens_reused: usize,
    pub by_kind: BTreeMap<EntityKind, usize>,
    pub dropped_overlaps: usize,
    /// Spans whose text already was a token
    pub skipped_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct Rewrite {
    pub text: String,
    pub replacements: Vec<Replacement>,
    /// Spans that lost an overlap contest
    pub dropped: Vec<Span>,
    pub stats: RewriteStats,
}

/// What a rewrite would do, without touching the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preview {
    pub total_entities: usize,
    pub would_create: usize,
    pub would_reuse: usize,
    pub by_kind: BTreeMap<EntityKind, usize>,
    pub entries: Vec<PreviewEntry>,
    pub dropped: Vec<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewEntry {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
    pub surface: String,
    /// Existing token, if the registry already knows the entity
    pub token: Option<Token>,
    pub is_new: bool,
}

struct Prepared {
    accepted: Vec<(Span, Entity)>,
    dropped: Vec<Span>,
    skipped_tokens: usize,
}

/// Pseudonymize `text` with a fresh default registry.
pub fn pseudonymize(text: &str, spans: &[Span]) -> Result<(String, Registry)> {
    let mut registry = Registry::new(RegistryConfig::default());
    let rewrite = Rewriter::new().rewrite(text, spans, &mut registry)?;
    Ok((rewrite.text, registry))
}

impl Rewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_order(mut self, order: NumberingOrder) -> Self {
        self.order = order;
        self
    }

    /// Only rewrite spans of these kinds; others are left in the text.
    pub fn only_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Replace every accepted span of `text` with its token from `allocator`.
    pub fn rewrite<A: TokenAllocator>(
        &self,
        text: &str,
        spans: &[Span],
        allocator: &mut A,
    ) -> Result<Rewrite> {
        let prepared = self.prepare(text, spans)?;

        let mut assigned: Vec<Option<(Token, bool)>> = vec![None; prepared.accepted.len()];
        let indices: Vec<usize> = match self.order {
            NumberingOrder::FirstSeen => (0..prepared.accepted.len()).collect(),
            NumberingOrder::Reverse => (0..prepared.accepted.len()).rev().collect(),
        };
        for idx in indices {
            assigned[idx] = Some(allocator.assign(&prepared.accepted[idx].1));
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut replacements = Vec::with_capacity(prepared.accepted.len());
        let mut stats = RewriteStats {
            original_len: text.len(),
            dropped_overlaps: prepared.dropped.len(),
            skipped_tokens: prepared.skipped_tokens,
            ..Default::default()
        };

        for ((span, entity), slot) in prepared.accepted.into_iter().zip(assigned) {
            let Some((token, created)) = slot else {
                continue;
            };
            out.push_str(&text[cursor..span.start]);
            out.push_str(&token.to_string());
            cursor = span.end;

            stats.entities_processed += 1;
            if created {
                stats.tokens_created += 1;
            } else {
                stats.tokens_reused += 1;
            }
            *stats.by_kind.entry(span.kind).or_insert(0) += 1;

            replacements.push(Replacement {
                start: span.start,
                end: span.end,
                kind: span.kind,
                surface: entity.surface,
                token,
                created,
            });
        }
        out.push_str(&text[cursor..]);
        stats.final_len = out.len();

        tracing::debug!(
            processed = stats.entities_processed,
            created = stats.tokens_created,
            reused = stats.tokens_reused,
            "rewrite complete"
        );

        Ok(Rewrite {
            text: out,
            replacements,
            dropped: prepared.dropped,
            stats,
        })
    }

    /// Report what `rewrite` would replace, reading the registry only.
    pub fn preview(&self, text: &str, spans: &[Span], registry: &Registry) -> Result<Preview> {
        let prepared = self.prepare(text, spans)?;
        let mut preview = Preview {
            dropped: prepared.dropped,
            ..Default::default()
        };
        let mut pending: HashSet<Entity> = HashSet::new();

        for (span, entity) in prepared.accepted {
            let token = registry.lookup(&entity).cloned();
            let is_new = token.is_none() && pending.insert(entity.clone());
            if is_new {
                preview.would_create += 1;
            } else {
                preview.would_reuse += 1;
            }
            preview.total_entities += 1;
            *preview.by_kind.entry(span.kind).or_insert(0) += 1;
            preview.entries.push(PreviewEntry {
                start: span.start,
                end: span.end,
                kind: span.kind,
                surface: entity.surface,
                token,
                is_new,
            });
        }

        Ok(preview)
    }

    fn prepare(&self, text: &str, spans: &[Span]) -> Result<Prepared> {
        let mut candidates = Vec::with_capacity(spans.len());
        let mut skipped_tokens = 0;

        for span in spans {
            if let Some(kinds) = &self.kinds
                && !kinds.contains(&span.kind)
            {
                continue;
            }
            let surface = span.validate(text)?;
            if Token::is_token(surface) {
                skipped_tokens += 1;
                continue;
            }
            // Padding around the entity stays in the text as ordinary bytes
            let core = surface.trim();
            if core.is_empty() {
                candidates.push(Span::new(span.start, span.end, span.kind));
            } else {
                let start = span.start + (surface.len() - surface.trim_start().len());
                candidates.push(Span::new(start, start + core.len(), span.kind));
            }
        }

        candidates.sort_by(|a, b| (a.start, a.end, a.kind).cmp(&(b.start, b.end, b.kind)));
        candidates.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.kind == b.kind);

        let (kept, dropped) = match self.overlap {
            OverlapPolicy::Reject => {
                reject_overlaps(&candidates)?;
                (candidates, Vec::new())
            }
            OverlapPolicy::Resolve => resolve_overlaps(candidates),
        };

        for loser in &dropped {
            tracing::warn!(
                start = loser.start,
                end = loser.end,
                kind = %loser.kind,
                "dropping overlapping span"
            );
        }

        let accepted = kept
            .into_iter()
            .map(|span| {
                let entity =
                    Entity::new(span.kind, &text[span.start..span.end]).map_err(|e| e.at(span.range()))?;
                Ok((span, entity))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Prepared {
            accepted,
            dropped,
            skipped_tokens,
        })
    }
}

/// Fail on the first pair of spans sharing characters. Input sorted by start.
fn reject_overlaps(sorted: &[Span]) -> Result<()> {
    let mut widest: Option<&Span> = None;
    for span in sorted {
        if let Some(prev) = widest
            && span.start < prev.end
        {
            return Err(CoreError::OverlappingSpans {
                first: prev.range(),
                second: span.range(),
            });
        }
        if widest.is_none_or(|prev| span.end > prev.end) {
            widest = Some(span);
        }
    }
    Ok(())
}

/// Keep a non-overlapping subset: longest first, then earliest start, then
/// kind order. Returns `(kept sorted by start, dropped)`.
fn resolve_overlaps(spans: Vec<Span>) -> (Vec<Span>, Vec<Span>) {
    let mut ranked = spans;
    ranked.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then(a.start.cmp(&b.start))
            .then(a.kind.cmp(&b.kind))
    });

    // start -> end of every kept span
    let mut taken: BTreeMap<usize, usize> = BTreeMap::new();
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for span in ranked {
        let clashes_before = taken
            .range(..=span.start)
            .next_back()
            .is_some_and(|(_, &end)| end > span.start);
        let clashes_after = taken
            .range(span.start..)
            .next()
            .is_some_and(|(&start, _)| start < span.end);

        if clashes_before || clashes_after {
            dropped.push(span);
        } else {
            taken.insert(span.start, span.end);
            kept.push(span);
        }
    }

    kept.sort_by_key(|s| s.start);
    dropped.sort_by_key(|s| s.start);
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{SharedRegistry, TokenStyle};

    const TEXT: &str = "* Julie Benetti, rectrice de l'Académie de Paris.\n\
                        Plus tard, JULIE BENETTI quitte Paris (Ekole+2Wikipédia+2).";

    fn find(text: &str, needle: &str, nth: usize) -> (usize, usize) {
        let start = text.match_indices(needle).nth(nth).unwrap().0;
        (start, start + needle.len())
    }

    fn span(text: &str, needle: &str, nth: usize, kind: EntityKind) -> Span {
        let (start, end) = find(text, needle, nth);
        Span::new(start, end, kind)
    }

    fn sample_spans() -> Vec<Span> {
        vec![
            span(TEXT, "Julie Benetti", 0, EntityKind::Person),
            span(TEXT, "Académie de Paris", 0, EntityKind::Org),
            span(TEXT, "JULIE BENETTI", 0, EntityKind::Person),
            span(TEXT, "Paris", 1, EntityKind::Place),
        ]
    }

    #[test]
    fn test_pseudonymize_sample() {
        let (text, registry) = pseudonymize(TEXT, &sample_spans()).unwrap();
        assert_eq!(
            text,
            "* ENT_0001, rectrice de l'ENT_0002.\n\
             Plus tard, ENT_0001 quitte ENT_0003 (Ekole+2Wikipédia+2)."
        );
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.resolve_str("ENT_0001").unwrap().surface, "Julie Benetti");
    }

    #[test]
    fn test_text_outside_spans_untouched() {
        let spans = sample_spans();
        let rewrite = Rewriter::new()
            .rewrite(TEXT, &spans, &mut Registry::default())
            .unwrap();

        // Rebuild the gaps from both sides and compare
        let mut original_gaps = Vec::new();
        let mut cursor = 0;
        for s in &spans {
            original_gaps.push(&TEXT[cursor..s.start]);
            cursor = s.end;
        }
        original_gaps.push(&TEXT[cursor..]);

        let mut rewritten_gaps = Vec::new();
        let mut rest = rewrite.text.as_str();
        for r in &rewrite.replacements {
            let token = r.token.to_string();
            let pos = rest.find(&token).unwrap();
            rewritten_gaps.push(&rest[..pos]);
            rest = &rest[pos + token.len()..];
        }
        rewritten_gaps.push(rest);

        assert_eq!(original_gaps, rewritten_gaps);
    }

    #[test]
    fn test_stats() {
        let rewrite = Rewriter::new()
            .rewrite(TEXT, &sample_spans(), &mut Registry::default())
            .unwrap();
        let stats = &rewrite.stats;
        assert_eq!(stats.entities_processed, 4);
        assert_eq!(stats.tokens_created, 3);
        assert_eq!(stats.tokens_reused, 1);
        assert_eq!(stats.by_kind[&EntityKind::Person], 2);
        assert_eq!(stats.original_len, TEXT.len());
        assert_eq!(stats.final_len, rewrite.text.len());
    }

    #[test]
    fn test_reverse_numbering() {
        let rewrite = Rewriter::new()
            .with_order(NumberingOrder::Reverse)
            .rewrite(TEXT, &sample_spans(), &mut Registry::default())
            .unwrap();
        assert_eq!(
            rewrite.text,
            "* ENT_0002, rectrice de l'ENT_0003.\n\
             Plus tard, ENT_0002 quitte ENT_0001 (Ekole+2Wikipédia+2)."
        );
        assert!(rewrite.replacements[2].created);
        assert!(!rewrite.replacements[0].created);
    }

    #[test]
    fn test_already_tokenized_text_is_unchanged() {
        let (once, _) = pseudonymize(TEXT, &sample_spans()).unwrap();

        let (twice, registry) = pseudonymize(&once, &[]).unwrap();
        assert_eq!(twice, once);
        assert!(registry.is_empty());

        // A detector that flags the tokens themselves changes nothing either
        let token_spans = vec![span(&once, "ENT_0001", 0, EntityKind::Person)];
        let rewrite = Rewriter::new()
            .rewrite(&once, &token_spans, &mut Registry::default())
            .unwrap();
        assert_eq!(rewrite.text, once);
        assert_eq!(rewrite.stats.skipped_tokens, 1);
    }

    #[test]
    fn test_overlap_longest_wins() {
        let text = "Academie de Paris";
        let spans = vec![
            Span::new(0, 5, EntityKind::Org),
            Span::new(3, 8, EntityKind::Place),
            Span::new(0, 17, EntityKind::Org),
            Span::new(12, 17, EntityKind::Place),
        ];
        let rewrite = Rewriter::new()
            .rewrite(text, &spans, &mut Registry::default())
            .unwrap();
        assert_eq!(rewrite.text, "ENT_0001");
        assert_eq!(rewrite.dropped.len(), 3);
        assert_eq!(rewrite.stats.dropped_overlaps, 3);
    }

    #[test]
    fn test_overlap_tie_goes_to_earliest_start() {
        let text = "abcdefghij";
        let spans = vec![Span::new(3, 8, EntityKind::Org), Span::new(0, 5, EntityKind::Person)];
        let rewrite = Rewriter::new()
            .rewrite(text, &spans, &mut Registry::default())
            .unwrap();
        assert_eq!(rewrite.text, "ENT_0001fghij");
        assert_eq!(rewrite.replacements[0].kind, EntityKind::Person);
        assert_eq!(rewrite.dropped, vec![Span::new(3, 8, EntityKind::Org)]);
    }

    #[test]
    fn test_overlap_rejected() {
        let text = "abcdefghij";
        let spans = vec![Span::new(0, 5, EntityKind::Person), Span::new(3, 8, EntityKind::Org)];
        let mut registry = Registry::default();
        let err = Rewriter::new()
            .with_overlap(OverlapPolicy::Reject)
            .rewrite(text, &spans, &mut registry)
            .unwrap_err();
        match err {
            CoreError::OverlappingSpans { first, second } => {
                assert_eq!(first, 0..5);
                assert_eq!(second, 3..8);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_nested_overlap_rejected() {
        let spans = vec![
            Span::new(0, 9, EntityKind::Org),
            Span::new(2, 3, EntityKind::Person),
            Span::new(5, 7, EntityKind::Place),
        ];
        let err = Rewriter::new()
            .with_overlap(OverlapPolicy::Reject)
            .rewrite("abcdefghij", &spans, &mut Registry::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::OverlappingSpans { .. }));
    }

    #[test]
    fn test_duplicate_spans_collapse() {
        let spans = vec![Span::new(0, 5, EntityKind::Place), Span::new(0, 5, EntityKind::Place)];
        let rewrite = Rewriter::new()
            .with_overlap(OverlapPolicy::Reject)
            .rewrite("Paris est loin", &spans, &mut Registry::default())
            .unwrap();
        assert_eq!(rewrite.text, "ENT_0001 est loin");
    }

    #[test]
    fn test_padded_span_keeps_surrounding_whitespace() {
        use crate::restore::{UnknownTokenPolicy, restore};

        let text = "de Julie Benetti et X";
        let spans = vec![Span::new(2, 17, EntityKind::Person)];
        let mut registry = Registry::default();

        let rewrite = Rewriter::new().rewrite(text, &spans, &mut registry).unwrap();

        assert_eq!(rewrite.text, "de ENT_0001 et X");
        assert_eq!((rewrite.replacements[0].start, rewrite.replacements[0].end), (3, 16));
        let restored = restore(&rewrite.text, &registry, UnknownTokenPolicy::Strict).unwrap();
        assert_eq!(restored.text, text);
    }

    #[test]
    fn test_invalid_span_leaves_registry_untouched() {
        let mut registry = Registry::default();
        let spans = vec![
            span(TEXT, "Julie Benetti", 0, EntityKind::Person),
            Span::new(TEXT.len() - 2, TEXT.len() + 5, EntityKind::Place),
        ];
        let err = Rewriter::new().rewrite(TEXT, &spans, &mut registry).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSpan { range: Some(_), .. }));
        assert!(registry.is_empty());

        let blank = vec![Span::new(1, 2, EntityKind::Person)];
        let err = Rewriter::new().rewrite(TEXT, &blank, &mut registry).unwrap_err();
        assert_eq!(err.to_string(), "Invalid span at 1..2: no entity text in \" \"");
    }

    #[test]
    fn test_kind_filter() {
        let rewrite = Rewriter::new()
            .only_kinds([EntityKind::Person])
            .rewrite(TEXT, &sample_spans(), &mut Registry::default())
            .unwrap();
        assert!(rewrite.text.contains("l'Académie de Paris"));
        assert!(!rewrite.text.contains("Benetti"));
        assert_eq!(rewrite.stats.entities_processed, 2);
    }

    #[test]
    fn test_multibyte_and_newlines_preserved() {
        let text = "Élève : Zoé Lefèvre\n\t→ née à Besançon";
        let spans = vec![
            span(text, "Zoé Lefèvre", 0, EntityKind::Person),
            span(text, "Besançon", 0, EntityKind::Place),
        ];
        let (out, _) = pseudonymize(text, &spans).unwrap();
        assert_eq!(out, "Élève : ENT_0001\n\t→ née à ENT_0002");
    }

    #[test]
    fn test_preview_does_not_allocate() {
        let mut registry = Registry::default();
        registry.get_or_create(&Entity::new(EntityKind::Person, "Julie Benetti").unwrap());

        let preview = Rewriter::new()
            .preview(TEXT, &sample_spans(), &registry)
            .unwrap();
        assert_eq!(preview.total_entities, 4);
        assert_eq!(preview.would_create, 2);
        assert_eq!(preview.would_reuse, 2);
        assert_eq!(
            preview.entries[0].token.as_ref().map(|t| t.to_string()),
            Some("ENT_0001".to_string())
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_shared_registry_allocator() {
        let mut shared = SharedRegistry::new(Registry::new(RegistryConfig {
            style: TokenStyle::PerKind,
            start: 1,
        }));
        let first = Rewriter::new().rewrite(TEXT, &sample_spans(), &mut shared).unwrap();
        let second_text = "Julie Benetti à Lyon";
        let second_spans = vec![
            span(second_text, "Julie Benetti", 0, EntityKind::Person),
            span(second_text, "Lyon", 0, EntityKind::Place),
        ];
        let second = Rewriter::new()
            .rewrite(second_text, &second_spans, &mut shared)
            .unwrap();

        assert!(first.text.starts_with("* PERS_0001,"));
        assert_eq!(second.text, "PERS_0001 à LIEU_0002");
        assert_eq!(shared.len(), 4);
    }
}
