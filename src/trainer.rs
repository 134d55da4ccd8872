//! Incremental BPE training engine.
//!
//! Based on Algorithm 2 from "Byte Pair Encoding is Suboptimal for Language Model Pretraining"
//! https://aclanthology.org/2023.findings-acl.38.pdf
//!
//! Pair counts are maintained across merges instead of being rescanned, but every
//! step picks and merges exactly what [`most_frequent_pair`] followed by
//! [`merge_pair`] would on the current sequence.
//!
//! [`most_frequent_pair`]: crate::pairs::most_frequent_pair
//! [`merge_pair`]: crate::pairs::merge_pair

use std::{
    cmp::Ordering,
    collections::{BTreeSet, BinaryHeap, HashMap},
};

use crate::types::{TextIdx, Token, TokenFreq, TokenPair};

/// Node in doubly-linked list representing a token in the training sequence.
///
/// Uses index-based links rather than direct references to work within
/// Rust's ownership system. Nodes are stored in a Vec<Option<Node>> arena.
#[derive(Debug)]
struct Node {
    /// The token identifier at this position.
    token: Token,

    /// Index of the previous node in the sequence, if any.
    prev_idx: Option<TextIdx>,

    /// Index of the next node in the sequence, if any.
    next_idx: Option<TextIdx>,
}

/// Item in the max heap for tracking most frequent token pairs.
///
/// The heap may contain stale entries after merges, so every popped item
/// must be validated against `pair_positions` before use.
#[derive(Debug, PartialEq, Eq)]
struct HeapItem {
    /// Frequency count of this token pair when the item was pushed.
    freq: TokenFreq,

    /// Arena index of the pair's first occurrence when the item was pushed.
    first: TextIdx,

    /// The token pair being tracked.
    pair: TokenPair,
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Highest freq first; among equal freqs, the earliest first occurrence.
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.freq
            .cmp(&other.freq)
            .then_with(|| other.first.cmp(&self.first))
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

/// BPE training structure.
///
/// This trainer uses a *Vec-as-arena* pattern to represent a
/// linked list of nodes. Direct `Node` ↔ `Node` references are
/// avoided due to Rust's ownership and borrowing rules.
///
/// Nodes are stored in a `Vec<Option<Node>>`, where:
/// - The `Vec` provides stable indices for nodes
/// - Deletions are O(1) by setting entries to `None`
/// - Traversal is done via index-based left/right links inside `Node`
///
/// A merge keeps the left node and deletes the right one, so arena order
/// always matches sequence order. The smallest position of a pair is
/// therefore its first occurrence in the current sequence.
#[derive(Debug, Default)]
pub(crate) struct BPETrainer {
    /// Storage arena for nodes.
    ///
    /// `None` represents a deleted node.
    nodes: Vec<Option<Node>>,

    /// Vec index pointing linked list's head.
    head_idx: Option<TextIdx>,

    /// Max heap of (frequency, first position, pair).
    ///
    /// Contains stale entries that need to be guarded against.
    heap: BinaryHeap<HeapItem>,

    /// Positions where each token pair occurs.
    /// pair -> ordered set of positions [index of first token of every pair].
    ///
    /// Source of truth for both pair positions and frequencies.
    pair_positions: HashMap<TokenPair, BTreeSet<TextIdx>>,
}

impl BPETrainer {
    /// Creates a trainer over an initial token sequence.
    pub(crate) fn new(tokens: &[Token]) -> Self {
        let n = tokens.len();
        let mut nodes = Vec::with_capacity(n);

        for (i, &token) in tokens.iter().enumerate() {
            let prev = if i > 0 { Some(i - 1) } else { None };
            let next = if i + 1 < n { Some(i + 1) } else { None };
            nodes.push(Some(Node {
                token,
                prev_idx: prev,
                next_idx: next,
            }));
        }

        let head = if nodes.is_empty() { None } else { Some(0) };

        let mut trainer = BPETrainer {
            nodes,
            head_idx: head,
            ..Default::default()
        };

        trainer.build_initial_pairs(tokens);

        trainer
    }

    /// Number of tokens in the current sequence.
    pub(crate) fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Returns the most frequent pair and its count without merging it.
    ///
    /// Returns `None` once no adjacent pair remains.
    pub(crate) fn most_frequent_pair(&mut self) -> Option<(TokenPair, TokenFreq)> {
        // After merges, some entries in the heap will have stale counts or
        // first positions. Keep popping until an entry matches current state.
        while let Some(entry) = self.heap.peek() {
            if let Some(positions) = self.pair_positions.get(&entry.pair)
                && positions.len() == entry.freq
                && positions.first() == Some(&entry.first)
            {
                return Some((entry.pair, entry.freq));
            }
            self.heap.pop();
        }

        None
    }

    /// Merges every leftmost, non-overlapping occurrence of `pair` into `new_token`.
    ///
    /// Returns the number of occurrences merged.
    ///
    /// # Time Complexity
    ///
    /// `O(k log N)` where `k` is the number of occurrences of `pair`.
    pub(crate) fn merge(&mut self, pair: TokenPair, new_token: Token) -> usize {
        // Positions are visited in sequence order; an occurrence whose left
        // node was consumed by the previous merge fails validation.
        let positions: Vec<TextIdx> = self
            .pair_positions
            .remove(&pair)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();

        let mut merged = 0;

        for pos in positions {
            let Some(idx2) = self.merge_partner(pair, pos) else {
                continue;
            };

            let prev_idx = self.nodes[pos].as_ref().and_then(|n| n.prev_idx);
            let next_idx = self.nodes[idx2].as_ref().and_then(|n| n.next_idx);

            self.remove_neighbours(pair, prev_idx, idx2, next_idx);
            self.link_merged(pos, idx2, next_idx, new_token);
            self.add_neighbours(new_token, pos, prev_idx, next_idx);

            merged += 1;
        }

        merged
    }

    /// Returns the current token sequence as a vector.
    pub(crate) fn get_encodings(&self) -> Vec<Token> {
        let mut result = Vec::new();
        let mut current = self.head_idx;

        while let Some(idx) = current {
            let Some(node) = &self.nodes[idx] else {
                break;
            };
            result.push(node.token);
            current = node.next_idx;
        }

        result
    }

    /// Records every adjacent pair of the initial sequence and fills the heap.
    ///
    /// # Time Complexity
    ///
    /// O(N log N) where N is the length of the initial token sequence.
    fn build_initial_pairs(&mut self, tokens: &[Token]) {
        for (idx, window) in tokens.windows(2).enumerate() {
            self.pair_positions
                .entry(TokenPair(window[0], window[1]))
                .or_default()
                .insert(idx);
        }

        for (&pair, positions) in &self.pair_positions {
            if let Some(&first) = positions.first() {
                self.heap.push(HeapItem {
                    freq: positions.len(),
                    first,
                    pair,
                });
            }
        }
    }

    /// Returns the right node index if `pair` still starts at `pos`.
    fn merge_partner(&self, pair: TokenPair, pos: TextIdx) -> Option<TextIdx> {
        let left = self.nodes.get(pos)?.as_ref()?;
        let idx2 = left.next_idx?;
        let right = self.nodes.get(idx2)?.as_ref()?;

        (left.token == pair.0 && right.token == pair.1).then_some(idx2)
    }

    /// Drops the pairs that straddle the boundaries of the pair being merged.
    fn remove_neighbours(
        &mut self,
        pair: TokenPair,
        prev_idx: Option<TextIdx>,
        idx2: TextIdx,
        next_idx: Option<TextIdx>,
    ) {
        if let Some(prev) = prev_idx
            && let Some(token) = self.token_at(prev)
        {
            self.remove_pair_at(prev, TokenPair(token, pair.0));
        }

        if let Some(next) = next_idx
            && let Some(token) = self.token_at(next)
        {
            self.remove_pair_at(idx2, TokenPair(pair.1, token));
        }
    }

    /// Records the pairs formed by the merged token and its new neighbours.
    fn add_neighbours(
        &mut self,
        new_token: Token,
        pos: TextIdx,
        prev_idx: Option<TextIdx>,
        next_idx: Option<TextIdx>,
    ) {
        if let Some(prev) = prev_idx
            && let Some(token) = self.token_at(prev)
        {
            self.add_pair_at(prev, TokenPair(token, new_token));
        }

        if let Some(next) = next_idx
            && let Some(token) = self.token_at(next)
        {
            self.add_pair_at(pos, TokenPair(new_token, token));
        }
    }

    /// Rewrites the left node as the merged token and unlinks the right node.
    fn link_merged(
        &mut self,
        pos: TextIdx,
        idx2: TextIdx,
        next_idx: Option<TextIdx>,
        new_token: Token,
    ) {
        if let Some(node) = &mut self.nodes[pos] {
            node.token = new_token;
            node.next_idx = next_idx;
        }

        if let Some(next) = next_idx
            && let Some(node) = &mut self.nodes[next]
        {
            node.prev_idx = Some(pos);
        }

        self.nodes[idx2] = None;
    }

    fn token_at(&self, idx: TextIdx) -> Option<Token> {
        self.nodes.get(idx)?.as_ref().map(|n| n.token)
    }

    /// Removes one occurrence of `pair` and re-publishes its new state.
    fn remove_pair_at(&mut self, idx: TextIdx, pair: TokenPair) {
        let Some(positions) = self.pair_positions.get_mut(&pair) else {
            return;
        };
        positions.remove(&idx);

        match positions.first() {
            Some(&first) => {
                let freq = positions.len();
                self.heap.push(HeapItem { freq, first, pair });
            }
            None => {
                self.pair_positions.remove(&pair);
            }
        }
    }

    /// Adds one occurrence of `pair` and re-publishes its new state.
    fn add_pair_at(&mut self, idx: TextIdx, pair: TokenPair) {
        let positions = self.pair_positions.entry(pair).or_default();
        positions.insert(idx);

        if let Some(&first) = positions.first() {
            let freq = positions.len();
            self.heap.push(HeapItem { freq, first, pair });
        }
    }
}
