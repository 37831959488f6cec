//! Textual evidence overlap.
//!
//! Cosine similarity alone accepts paraphrases that share no actual
//! content with the evidence, so textual support additionally requires a
//! shared contiguous token run between step and fragment.

use std::collections::HashSet;

/// Lowercased whitespace tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|token| token.to_lowercase())
        .collect()
}

/// Whether the two token sequences share any contiguous run of `n` tokens.
///
/// Either side shorter than `n` can never share a run. `n == 0` is treated
/// as no requirement and always matches.
pub fn has_shared_ngram(a: &[String], b: &[String], n: usize) -> bool {
    if n == 0 {
        return true;
    }
    if a.len() < n || b.len() < n {
        return false;
    }
    let grams: HashSet<&[String]> = a.windows(n).collect();
    b.windows(n).any(|window| grams.contains(window))
}
