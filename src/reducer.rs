//! Turns raw detector output into a ranked, deduplicated ingredient list.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ai::object_detection::RawDetection;
use crate::vocabulary;

/// Minimum detector score for a detection to count as an ingredient.
///
/// Compared in f32: the model's own 0.35 (0.3499999940...) passes, the next
/// f32 below it does not.
pub const CONFIDENCE_THRESHOLD: f32 = 0.35;

/// A labelled detection that survived taxonomy lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionCandidate {
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub score: f32,
}

/// Resolve class indices to canonical labels, dropping anything that is not a
/// real taxonomy entry.
pub fn to_candidates(raw: &[RawDetection]) -> Vec<DetectionCandidate> {
    raw.iter()
        .filter_map(|det| {
            vocabulary::class_name(det.class_index).map(|name| DetectionCandidate {
                label: vocabulary::canonicalize(name),
                confidence: det.confidence,
            })
        })
        .collect()
}

/// Filter, merge and rank labelled candidates.
///
/// Keeps candidates scoring at least `threshold` whose label is in the
/// ingredient vocabulary, keeps the best score per label, and orders the result
/// by descending score. Equal scores keep the order in which the labels were
/// first seen.
pub fn reduce_candidates(candidates: &[DetectionCandidate], threshold: f32) -> Vec<Ingredient> {
    let mut ingredients: Vec<Ingredient> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        if candidate.confidence.is_nan() || candidate.confidence < threshold {
            continue;
        }

        let name = vocabulary::canonicalize(&candidate.label);
        if !vocabulary::is_ingredient(&name) {
            continue;
        }

        match slots.get(&name) {
            Some(&idx) => {
                let best = &mut ingredients[idx].score;
                if candidate.confidence > *best {
                    *best = candidate.confidence;
                }
            }
            None => {
                slots.insert(name.clone(), ingredients.len());
                ingredients.push(Ingredient {
                    name,
                    score: candidate.confidence,
                });
            }
        }
    }

    ingredients.sort_by(|a, b| b.score.total_cmp(&a.score));
    ingredients
}

/// Full reduction from raw detector output.
pub fn reduce(raw: &[RawDetection], threshold: f32) -> Vec<Ingredient> {
    reduce_candidates(&to_candidates(raw), threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::object_detection::BoundingBox;
    use proptest::prelude::*;

    const BANANA: i64 = 52;
    const APPLE: i64 = 53;
    const CAR: i64 = 3;
    const BOTTLE: i64 = 44;
    const CUP: i64 = 47;

    fn det(class_index: i64, confidence: f32) -> RawDetection {
        RawDetection {
            class_index,
            confidence,
            region: BoundingBox::default(),
        }
    }

    fn candidate(label: &str, confidence: f32) -> DetectionCandidate {
        DetectionCandidate {
            label: label.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_merges_duplicates_and_drops_non_food() {
        let out = reduce_candidates(
            &[
                candidate("banana", 0.9),
                candidate("banana", 0.5),
                candidate("car", 0.99),
            ],
            CONFIDENCE_THRESHOLD,
        );
        assert_eq!(
            out,
            vec![Ingredient {
                name: "banana".to_string(),
                score: 0.9
            }]
        );
    }

    #[test]
    fn test_below_threshold_dropped() {
        let out = reduce_candidates(&[candidate("apple", 0.2)], CONFIDENCE_THRESHOLD);
        assert!(out.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let out = reduce_candidates(&[candidate("apple", 0.35)], CONFIDENCE_THRESHOLD);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_threshold_boundary_is_the_f32_value() {
        let at = 0.35f32;
        let just_below = f32::from_bits(at.to_bits() - 1);
        assert!((at as f64) < 0.35);

        let out = reduce_candidates(
            &[candidate("apple", at), candidate("banana", just_below)],
            CONFIDENCE_THRESHOLD,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "apple");
    }

    #[test]
    fn test_labels_are_canonicalized() {
        let out = reduce_candidates(
            &[candidate("Hot Dog", 0.6), candidate("hot dog", 0.7)],
            CONFIDENCE_THRESHOLD,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "hot dog");
        assert_eq!(out[0].score, 0.7);
    }

    #[test]
    fn test_nan_confidence_dropped() {
        let out = reduce_candidates(&[candidate("apple", f32::NAN)], CONFIDENCE_THRESHOLD);
        assert!(out.is_empty());
    }

    #[test]
    fn test_reduce_from_raw_indices() {
        let raw = vec![
            det(0, 0.99),
            det(12, 0.99),
            det(500, 0.99),
            det(-3, 0.99),
            det(CAR, 0.8),
            det(BOTTLE, 0.4),
            det(BANANA, 0.7),
            det(APPLE, 0.1),
        ];
        let out = reduce(&raw, CONFIDENCE_THRESHOLD);
        let names: Vec<&str> = out.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["banana", "bottle"]);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let raw = vec![det(CUP, 0.5), det(BOTTLE, 0.5), det(BANANA, 0.5)];
        let out = reduce(&raw, CONFIDENCE_THRESHOLD);
        let names: Vec<&str> = out.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["cup", "bottle", "banana"]);
    }

    proptest! {
        #[test]
        fn prop_reducer_invariants(
            raw in proptest::collection::vec((-2i64..95, 0.0f32..=1.0), 0..60)
        ) {
            let detections: Vec<RawDetection> =
                raw.iter().map(|&(idx, conf)| det(idx, conf)).collect();
            let out = reduce(&detections, CONFIDENCE_THRESHOLD);

            for pair in out.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }

            let mut seen = std::collections::HashSet::new();
            for ingredient in &out {
                prop_assert!(seen.insert(ingredient.name.clone()));
                prop_assert!(ingredient.score >= CONFIDENCE_THRESHOLD);
                prop_assert!(vocabulary::is_ingredient(&ingredient.name));

                let best = raw
                    .iter()
                    .filter(|(idx, _)| vocabulary::class_name(*idx) == Some(ingredient.name.as_str()))
                    .map(|(_, conf)| *conf)
                    .fold(f32::NEG_INFINITY, f32::max);
                prop_assert_eq!(ingredient.score, best);
            }
        }
    }
}
