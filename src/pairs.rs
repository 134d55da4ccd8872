//! Pair statistics and pair merging over plain token sequences.
//!
//! These are the reference primitives of byte-pair encoding. The trainer and
//! converter maintain the same semantics incrementally.

use std::collections::HashMap;

use crate::types::{TextIdx, Token, TokenFreq, TokenPair};

/// Returns the most frequent adjacent pair and its count.
///
/// Overlapping windows are all counted, so `[7, 7, 7]` yields `((7, 7), 2)`.
/// When several pairs share the highest count, the pair whose first
/// occurrence comes earliest in `tokens` wins.
///
/// Returns `None` when `tokens` has fewer than two elements.
///
/// # Example
///
/// ```
/// use bytebpe::{most_frequent_pair, TokenPair};
///
/// assert_eq!(most_frequent_pair(&[1, 2, 3, 4, 3, 4]), Some((TokenPair(3, 4), 2)));
/// ```
pub fn most_frequent_pair(tokens: &[Token]) -> Option<(TokenPair, TokenFreq)> {
    // pair -> (count, index of first occurrence)
    let mut counts: HashMap<TokenPair, (TokenFreq, TextIdx)> = HashMap::new();

    for (idx, window) in tokens.windows(2).enumerate() {
        counts.entry(TokenPair(window[0], window[1])).or_insert((0, idx)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (freq_a, first_a)), (_, (freq_b, first_b))| {
            freq_a.cmp(freq_b).then_with(|| first_b.cmp(first_a))
        })
        .map(|(pair, (freq, _))| (pair, freq))
}

/// Replaces every leftmost, non-overlapping occurrence of `pair` with `new_token`.
///
/// The scan skips two positions after a match, so `(7, 7)` in `[7, 7, 7]`
/// merges only the first two elements. The input is left untouched.
///
/// # Example
///
/// ```
/// use bytebpe::{merge_pair, TokenPair};
///
/// assert_eq!(merge_pair(&[1, 2, 3, 4, 3, 4], TokenPair(3, 4), 5), vec![1, 2, 5, 5]);
/// ```
pub fn merge_pair(tokens: &[Token], pair: TokenPair, new_token: Token) -> Vec<Token> {
    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if i + 1 < tokens.len() && tokens[i] == pair.0 && tokens[i + 1] == pair.1 {
            merged.push(new_token);
            i += 2;
        } else {
            merged.push(tokens[i]);
            i += 1;
        }
    }

    merged
}
