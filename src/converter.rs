//! BPE Converter - the tokenizer's tables and the id ↔ bytes conversions built on them.
//!
//! Holds the merge rule table (with the order rules were learned in), the
//! vocabulary of byte values and the special-token table. Encoding re-applies
//! learned merges by table lookup only; pair frequencies are never recomputed.

use std::collections::HashMap;

use crate::{
    error::{BpeError, Result},
    pairs::merge_pair,
    types::{BASE_VOCAB_SIZE, ByteSeq, Token, TokenPair},
};

/// Merge rules, vocabulary and special tokens of one tokenizer.
///
/// Ids are handed out by the owning tokenizer; the converter only records
/// them. Composite ids and special ids share one id space and never overlap.
#[derive(Debug, Clone)]
pub(crate) struct BPEConverter {
    /// Maps token pairs to the token created by merging them.
    merges: HashMap<TokenPair, Token>,

    /// Merge rules in the order they were learned.
    merge_history: Vec<(TokenPair, Token)>,

    /// Maps token IDs to their byte sequences.
    ///
    /// - 0..256: Base vocabulary (single bytes)
    /// - merged ids: Concatenated byte sequences of both parents
    vocab: HashMap<Token, ByteSeq>,

    special_to_id: HashMap<String, Token>,

    id_to_special: HashMap<Token, String>,
}

impl Default for BPEConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl BPEConverter {
    /// Creates a converter holding only the 256 base byte tokens.
    pub(crate) fn new() -> Self {
        let vocab = (0..BASE_VOCAB_SIZE)
            .map(|id| (id, vec![id as u8]))
            .collect();

        Self {
            merges: HashMap::new(),
            merge_history: Vec::new(),
            vocab,
            special_to_id: HashMap::new(),
            id_to_special: HashMap::new(),
        }
    }

    /// Records a learned merge rule and the vocabulary entry it creates.
    ///
    /// The entry's bytes are the concatenation of both parents' bytes. The
    /// caller guarantees that `pair` has no rule yet and `new_token` is fresh.
    pub(crate) fn add_merge(&mut self, pair: TokenPair, new_token: Token) {
        let mut merged_bytes = Vec::new();
        if let Some(left_bytes) = self.vocab.get(&pair.0) {
            merged_bytes.extend_from_slice(left_bytes);
        }
        if let Some(right_bytes) = self.vocab.get(&pair.1) {
            merged_bytes.extend_from_slice(right_bytes);
        }

        self.merges.insert(pair, new_token);
        self.merge_history.push((pair, new_token));
        self.vocab.insert(new_token, merged_bytes);
    }

    /// Records a special token in both directions of the special-token table.
    pub(crate) fn add_special(&mut self, literal: &str, token: Token) {
        self.special_to_id.insert(literal.to_owned(), token);
        self.id_to_special.insert(token, literal.to_owned());
    }

    /// Encodes a token sequence by applying learned BPE merge rules.
    ///
    /// Scans left to right for the first adjacent pair that has a rule. On a
    /// hit every occurrence of that pair is merged with [`merge_pair`] and the
    /// scan resumes at the same position; otherwise it moves one step right.
    /// Passes repeat until one completes without a merge, so pairs formed to
    /// the left of the cursor are picked up too. When this returns, no
    /// adjacent pair of the output has a rule.
    ///
    /// # Arguments
    ///
    /// * `tokens` - Input sequence of tokens to encode.
    ///
    /// # Returns
    ///
    /// A new token sequence with all applicable merge rules applied.
    /// The output will have the same or fewer tokens than the input.
    pub(crate) fn encode(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        if self.merges.is_empty() {
            return tokens;
        }

        loop {
            let mut merged_any = false;
            let mut i = 0;

            while i + 1 < tokens.len() {
                let pair = TokenPair(tokens[i], tokens[i + 1]);
                match self.merges.get(&pair) {
                    Some(&new_token) => {
                        tokens = merge_pair(&tokens, pair, new_token);
                        merged_any = true;
                    }
                    None => i += 1,
                }
            }

            if !merged_any {
                return tokens;
            }
        }
    }

    /// Decodes a token sequence back into bytes.
    ///
    /// Special tokens yield their literal's UTF-8 bytes; every other id yields
    /// its vocabulary entry.
    ///
    /// # Errors
    ///
    /// Returns [`BpeError::UnknownTokenId`] for the first id that is neither a
    /// special token nor a vocabulary entry.
    pub(crate) fn decode(&self, tokens: &[Token]) -> Result<ByteSeq> {
        let mut result = Vec::new();

        for &token in tokens {
            if let Some(literal) = self.id_to_special.get(&token) {
                result.extend_from_slice(literal.as_bytes());
                continue;
            }

            if let Some(bytes) = self.vocab.get(&token) {
                result.extend_from_slice(bytes);
                continue;
            }

            return Err(BpeError::UnknownTokenId(token));
        }

        Ok(result)
    }

    /// Returns the id created for `pair`, if a rule exists.
    pub(crate) fn merge_rule(&self, pair: TokenPair) -> Option<Token> {
        self.merges.get(&pair).copied()
    }

    /// Returns the total number of merge rules in this converter.
    pub(crate) fn num_merges(&self) -> usize {
        self.merge_history.len()
    }

    /// Merge rules in the order they were learned.
    pub(crate) fn merge_history(&self) -> &[(TokenPair, Token)] {
        &self.merge_history
    }

    /// Byte value of a vocabulary entry. Special tokens are not included.
    pub(crate) fn token_bytes(&self, token: Token) -> Option<&[u8]> {
        self.vocab.get(&token).map(Vec::as_slice)
    }

    /// Number of vocabulary entries (base plus composite).
    pub(crate) fn vocab_len(&self) -> usize {
        self.vocab.len()
    }

    pub(crate) fn special_id(&self, literal: &str) -> Option<Token> {
        self.special_to_id.get(literal).copied()
    }

    pub(crate) fn specials(&self) -> &HashMap<String, Token> {
        &self.special_to_id
    }
}
