//! Type aliases and shared types for BPE training and encoding.
//!
//! These type aliases provide semantic clarity throughout the codebase.

use std::fmt;

/// Number of base tokens: one per possible byte value.
pub const BASE_VOCAB_SIZE: usize = 256;

/// Represents a token identifier in the vocabulary.
///
/// Token IDs are assigned sequentially, starting from 0 for base tokens (bytes 0-255)
/// and incrementing for each learned merge or registered special token.
pub type Token = usize;

/// Position of a token in a token sequence.
///
/// Used to index into the doubly-linked list structure during training.
pub(crate) type TextIdx = usize;

/// Frequency count for token pairs during training.
pub type TokenFreq = usize;

/// A sequence of raw bytes.
pub(crate) type ByteSeq = Vec<u8>;

/// An ordered pair of adjacent tokens.
///
/// Used as a key for looking up merge rules during encoding and for
/// tracking pair frequencies during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenPair(pub Token, pub Token);

impl From<(Token, Token)> for TokenPair {
    fn from((left, right): (Token, Token)) -> Self {
        Self(left, right)
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}
