//! Byte-level BPE (Byte-Pair Encoding) tokenizer.
//!
//! Learns a subword vocabulary by repeatedly merging the most frequent
//! adjacent pair of a UTF-8 byte sequence, then uses the learned merges to
//! convert text to token ids and back losslessly.
//!
//! Python bindings are available behind the `python` feature.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

mod converter;
mod error;
mod observer;
mod pairs;
mod projection;
mod tokenizer;
mod trainer;
mod types;

#[cfg(feature = "python")]
mod python;

pub use error::{BpeError, ErrorMode, Result};
pub use observer::{
    LogObserver, NoopObserver, ProgressObserver, StopReason, TokenizerObserver,
    TrainSummary,
};
pub use pairs::{merge_pair, most_frequent_pair};
pub use projection::{bytes_to_string, string_to_bytes};
pub use tokenizer::Tokenizer;
pub use types::{BASE_VOCAB_SIZE, Token, TokenFreq, TokenPair};
