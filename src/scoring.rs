//! Multi-dimensional relevance scoring
//!
//! Every candidate gets a six-dimension [`ScoreBreakdown`] — semantic,
//! temporal, importance, emotional, entity, intent — fused by fixed weights
//! that sum to 1.0. Each dimension is clamped to [0, 1] so the fused total
//! is also a valid [0, 1] score.
//!
//! Semantic similarity from the vector index is consumed upstream as the
//! candidate-selection signal; the semantic dimension here is a lexical
//! fallback, which avoids double counting the embedding signal.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use std::collections::HashSet;

use crate::constants::{
    EMOTION_UNMATCHED_BASELINE, IMPORTANCE_BLEND, INTENT_MISMATCH_SCORE, RECENCY_DECAY_DAYS,
    SEMANTIC_NEUTRAL, TEMPORAL_WINDOW_BOOST, TEMPORAL_WINDOW_MISS, WEIGHT_EMOTIONAL,
    WEIGHT_ENTITY, WEIGHT_IMPORTANCE, WEIGHT_INTENT, WEIGHT_SEMANTIC, WEIGHT_TEMPORAL,
};
use crate::types::{MemoryCategory, MemoryRecord, QuerySpec, ScoreBreakdown};

/// Sum of the six dimension weights; must be exactly 1.0
pub fn weight_sum() -> f32 {
    WEIGHT_SEMANTIC
        + WEIGHT_TEMPORAL
        + WEIGHT_IMPORTANCE
        + WEIGHT_EMOTIONAL
        + WEIGHT_ENTITY
        + WEIGHT_INTENT
}

/// Score one candidate record against the query
///
/// Each dimension is computed independently; a dimension that cannot be
/// evaluated falls back to its neutral value rather than voiding the
/// ranking.
pub fn score_record(record: &MemoryRecord, query: &QuerySpec, now: DateTime<Utc>) -> ScoreBreakdown {
    let semantic = semantic_score(record, query);
    let temporal = temporal_score(record, query, now);
    let importance = importance_score(record);
    let emotional = emotional_score(record, query);
    let entity = entity_score(record, query);
    let intent = intent_score(record, query);

    let total = WEIGHT_SEMANTIC * semantic
        + WEIGHT_TEMPORAL * temporal
        + WEIGHT_IMPORTANCE * importance
        + WEIGHT_EMOTIONAL * emotional
        + WEIGHT_ENTITY * entity
        + WEIGHT_INTENT * intent;

    ScoreBreakdown {
        semantic,
        temporal,
        importance,
        emotional,
        entity,
        intent,
        total,
    }
}

/// Fraction of query tokens present (case-insensitive) in the content
///
/// Neutral 0.5 when the query carries no free text.
fn semantic_score(record: &MemoryRecord, query: &QuerySpec) -> f32 {
    let Some(text) = query.text.as_deref() else {
        return SEMANTIC_NEUTRAL;
    };
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return SEMANTIC_NEUTRAL;
    }

    let content = record.content.to_lowercase();
    let matched = tokens.iter().filter(|t| content.contains(t.as_str())).count();
    (matched as f32 / tokens.len() as f32).clamp(0.0, 1.0)
}

/// Exponential recency decay, modulated by the explicit temporal window
///
/// recency = exp(-days_since_last_access / 30). With an explicit temporal
/// predicate: ×1.5 (capped at 1.0) when the record's creation time falls
/// inside the window, ×0.5 otherwise.
fn temporal_score(record: &MemoryRecord, query: &QuerySpec, now: DateTime<Utc>) -> f32 {
    let recency = (-record.days_since_access(now) / RECENCY_DECAY_DAYS).exp() as f32;

    match &query.temporal {
        None => recency.clamp(0.0, 1.0),
        Some(filter) => {
            let factor = if filter.matches(record.created_at, now) {
                TEMPORAL_WINDOW_BOOST
            } else {
                TEMPORAL_WINDOW_MISS
            };
            (recency * factor).clamp(0.0, 1.0)
        }
    }
}

/// Blend of record importance and ingestion confidence
fn importance_score(record: &MemoryRecord) -> f32 {
    (IMPORTANCE_BLEND * record.importance + (1.0 - IMPORTANCE_BLEND) * record.confidence)
        .clamp(0.0, 1.0)
}

/// Match strength against the query's emotion predicate
///
/// No predicate → neutral 0.5. A matching record scores by its own
/// intensity (floored at 0.5 so a weak but matching record still ranks
/// above the unmatched baseline). Unmatched records get the low baseline
/// rather than zero.
fn emotional_score(record: &MemoryRecord, query: &QuerySpec) -> f32 {
    let Some(filter) = &query.emotion else {
        return 0.5;
    };
    if filter.matches(record) {
        (0.5 + record.intensity / 2.0).clamp(0.0, 1.0)
    } else {
        EMOTION_UNMATCHED_BASELINE
    }
}

/// Fraction of query entities present in the record's entity set or content
fn entity_score(record: &MemoryRecord, query: &QuerySpec) -> f32 {
    let Some(entities) = &query.entities else {
        return 0.5;
    };
    if entities.is_empty() {
        return 0.5;
    }

    let content = record.content.to_lowercase();
    let related: HashSet<String> = record.entities.iter().map(|e| e.to_lowercase()).collect();
    let matched = entities
        .iter()
        .map(|e| e.to_lowercase())
        .filter(|e| related.contains(e) || content.contains(e.as_str()))
        .count();
    (matched as f32 / entities.len() as f32).clamp(0.0, 1.0)
}

/// Exact intent-tag match, neutral when the query has no intent
fn intent_score(record: &MemoryRecord, query: &QuerySpec) -> f32 {
    let Some(intent) = &query.intent else {
        return 0.5;
    };
    if record
        .intent_tag
        .as_deref()
        .map(|t| t.eq_ignore_ascii_case(intent))
        .unwrap_or(false)
    {
        1.0
    } else {
        INTENT_MISMATCH_SCORE
    }
}

/// Sort scored candidates: descending total, ties broken by most-recent
/// access
pub fn sort_ranked(candidates: &mut [(MemoryRecord, ScoreBreakdown)]) {
    candidates.sort_by(|a, b| {
        OrderedFloat(b.1.total)
            .cmp(&OrderedFloat(a.1.total))
            .then_with(|| b.0.last_accessed.cmp(&a.0.last_accessed))
    });
}

/// Diversified top-k selection over an already score-sorted slice
///
/// Two passes: first the single best-scoring item per distinct category,
/// then remaining slots filled by global score order. When distinct
/// categories outnumber the slots, the most-represented categories claim
/// them first. Returns the selected indices in the input's (descending
/// score) order.
pub fn diversify_top_k<T>(
    sorted: &[T],
    k: usize,
    category_of: impl Fn(&T) -> MemoryCategory,
) -> Vec<usize> {
    if sorted.len() <= k {
        return (0..sorted.len()).collect();
    }

    let mut taken: HashSet<usize> = HashSet::new();

    // Pass 1: best item per category, categories ordered by member count
    // (ties broken by the category's best rank)
    let mut by_category: Vec<(MemoryCategory, usize, usize)> = Vec::new();
    for (i, item) in sorted.iter().enumerate() {
        let category = category_of(item);
        match by_category.iter_mut().find(|(c, _, _)| *c == category) {
            Some((_, count, _)) => *count += 1,
            None => by_category.push((category, 1, i)),
        }
    }
    by_category.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
    for (_, _, best_index) in by_category.into_iter().take(k) {
        taken.insert(best_index);
    }

    // Pass 2: fill remaining slots by global order
    for i in 0..sorted.len() {
        if taken.len() >= k {
            break;
        }
        taken.insert(i);
    }

    let mut selected: Vec<usize> = taken.into_iter().collect();
    selected.sort();
    selected
}
