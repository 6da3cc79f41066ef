use std::collections::HashMap;

use tracing::info;

use crate::subtitle::Segment;

/// Unique segments in first-occurrence order plus, for every trimmed text,
/// the indices of all its occurrences in the input.
pub type Deduplicated = (Vec<Segment>, HashMap<String, Vec<usize>>);

/// Collapse segments to unique trimmed text.
pub fn deduplicate(segments: &[Segment]) -> Deduplicated {
    let mut text_to_indices: HashMap<String, Vec<usize>> = HashMap::new();
    let mut unique_segments = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        let text = segment.text.trim();
        match text_to_indices.get_mut(text) {
            Some(indices) => indices.push(idx),
            None => {
                text_to_indices.insert(text.to_string(), vec![idx]);
                unique_segments.push(segment.clone());
            }
        }
    }

    if !segments.is_empty() {
        let ratio = unique_segments.len() as f64 / segments.len() as f64;
        if ratio < 0.9 {
            info!(
                "Deduplication: {} -> {} unique ({:.1}% of input)",
                segments.len(),
                unique_segments.len(),
                ratio * 100.0
            );
        }
    }

    (unique_segments, text_to_indices)
}

/// Rebuild the full-length result from per-text translations.
///
/// Timing is always taken from the original segment. Texts missing from
/// `translations` keep their original segment text.
pub fn reconstruct(
    segments: &[Segment],
    text_to_indices: &HashMap<String, Vec<usize>>,
    translations: &HashMap<String, String>,
) -> Vec<Segment> {
    let mut result: Vec<Segment> = segments.to_vec();

    for (text, indices) in text_to_indices {
        if let Some(translated) = translations.get(text) {
            for &idx in indices {
                result[idx].text = translated.clone();
            }
        }
    }

    result
}
