//! Approximate symbol-name matching.
//!
//! When a requested name is not an exact export, the loader falls back to
//! fuzzy matching over the module's export table: normalized Levenshtein
//! similarity with greedy first-acceptable selection in table order. The
//! first candidate above the threshold wins; later candidates are never
//! examined, so table order decides between close spellings.

/// Minimum similarity for a fuzzy match to be accepted.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Levenshtein edit distance between two strings.
///
/// Insertions, deletions and substitutions each cost 1. Operates on
/// `char` boundaries, not bytes.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized similarity between two symbol names.
///
/// `(max_len - distance) / max_len`, so identical strings score 1.0 and
/// fully dissimilar strings score 0.0. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(a, b)) as f64 / max_len as f64
}

/// Index of the first candidate whose similarity to `wanted` exceeds
/// `threshold`.
///
/// Greedy by construction: scanning stops at the first acceptable
/// candidate even if a later one would score higher.
pub fn first_acceptable<'a, I>(wanted: &str, candidates: I, threshold: f64) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    for (idx, candidate) in candidates.into_iter().enumerate() {
        if similarity(wanted, candidate) > threshold {
            return Some(idx);
        }
    }
    None
}
