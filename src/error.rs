//! Error types for tokenizer construction, training and decoding.

use std::{str::FromStr, string::FromUtf8Error};

use indicatif::style::TemplateError;
use thiserror::Error;

use crate::types::Token;

/// Result type alias for tokenizer operations.
pub type Result<T> = std::result::Result<T, BpeError>;

/// Controls how UTF-8 decoding errors are handled.
///
/// Mirrors Python's `bytes.decode(errors=...)` semantics.
/// Unknown token IDs always produce errors regardless of mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Raise an error on invalid UTF-8 like Python's "strict".
    #[default]
    Strict,
    /// Replace invalid UTF-8 sequences with U+FFFD (like Python's "replace").
    Replace,
}

impl FromStr for ErrorMode {
    type Err = String;

    /// Parses a Python-style error mode string ("strict" or "replace").
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "replace" => Ok(Self::Replace),
            _ => Err(format!(
                "invalid error mode: {s:?} (expected \"strict\" or \"replace\")"
            )),
        }
    }
}

/// Errors surfaced by the tokenizer.
///
/// None of these are transient, so nothing is retried internally.
#[derive(Debug, Error)]
pub enum BpeError {
    /// The requested vocabulary ceiling leaves no room for merges.
    #[error("max_vocab_size must be greater than 256, got {max_vocab_size}")]
    Configuration {
        /// The rejected ceiling.
        max_vocab_size: usize,
    },

    /// An empty string cannot be registered as a special token.
    #[error("special token literal must not be empty")]
    EmptySpecialToken,

    /// Decoded bytes are not valid UTF-8.
    #[error("invalid UTF-8 in decoded bytes: {0}")]
    Encoding(#[from] FromUtf8Error),

    /// Token ID is neither a vocabulary entry nor a special token.
    #[error("unknown token id: {0}")]
    UnknownTokenId(Token),

    /// Progress bar template string was invalid.
    #[error("template parsing failed: {0}")]
    ProgressBarSetup(#[from] TemplateError),
}
