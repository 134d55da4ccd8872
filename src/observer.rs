//! Hooks for watching registration and training.
//!
//! The tokenizer never prints. It reports what it does to a [`TokenizerObserver`],
//! which defaults to [`LogObserver`] (the `log` facade, inert without a logger).

use std::fmt;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::{
    error::Result,
    types::{Token, TokenFreq, TokenPair},
};

/// Why a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The vocabulary reached `max_vocab_size`.
    VocabFull,
    /// `stop_early` was set and the best remaining pair occurred only once.
    NoCompressionGain,
    /// The working sequence had no adjacent pair left to merge.
    Exhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VocabFull => write!(f, "vocabulary full"),
            Self::NoCompressionGain => write!(f, "no compression gain left"),
            Self::Exhausted => write!(f, "no pairs left"),
        }
    }
}

/// Outcome of one call to [`Tokenizer::train`](crate::Tokenizer::train).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainSummary {
    /// Merge rules learned by this call.
    pub merges: usize,
    /// Vocabulary size after the call.
    pub vocab_size: usize,
    /// Why the call stopped.
    pub stop: StopReason,
}

/// Receives events from a tokenizer: special-token registration as well as
/// training progress.
///
/// All methods default to doing nothing, so implementors pick what they need.
pub trait TokenizerObserver: Send + Sync {
    /// A special token was registered with a fresh id.
    fn on_special_token(&self, _literal: &str, _token: Token) {}

    /// Training is about to start.
    ///
    /// `sequence_len` is the working sequence length after existing merges
    /// were applied; `budget` is the number of merges left before the
    /// vocabulary is full.
    fn on_train_start(&self, _sequence_len: usize, _budget: usize) {}

    /// A pair occurring `freq` times was merged into `new_token`.
    fn on_merge(&self, _pair: TokenPair, _new_token: Token, _freq: TokenFreq) {}

    /// Training finished.
    fn on_train_end(&self, _summary: &TrainSummary) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TokenizerObserver for NoopObserver {}

/// Observer that reports through the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TokenizerObserver for LogObserver {
    fn on_special_token(&self, literal: &str, token: Token) {
        log::info!("Registering special token {literal} with id {token}.");
    }

    fn on_train_start(&self, sequence_len: usize, budget: usize) {
        log::info!("Training on {sequence_len} tokens with room for {budget} merges.");
    }

    fn on_merge(&self, pair: TokenPair, new_token: Token, freq: TokenFreq) {
        log::debug!("Merging pair {pair} ({freq} occurrences) -> token {new_token}");
    }

    fn on_train_end(&self, summary: &TrainSummary) {
        match summary.stop {
            StopReason::VocabFull => log::info!(
                "Stopping compression after {} pair merges with vocab size of {}.",
                summary.merges,
                summary.vocab_size
            ),
            reason => log::warn!(
                "Stopping compression after {} pair merges with vocab size of {} ({reason}).",
                summary.merges,
                summary.vocab_size
            ),
        }
    }
}

/// Observer that draws a progress bar over the merge budget.
#[derive(Clone)]
pub struct ProgressObserver {
    pb: ProgressBar,
}

impl ProgressObserver {
    /// Creates a progress bar with elapsed time, a fixed-width message label,
    /// and position/total counters, drawn to stderr.
    ///
    /// # Errors
    ///
    /// Returns [`BpeError::ProgressBarSetup`](crate::BpeError::ProgressBarSetup)
    /// if the progress bar style template is invalid.
    pub fn new() -> Result<Self> {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {msg:<30!} {wide_bar} {pos}/{len}")?;

        pb.set_style(style);
        pb.set_message("Training merges");

        Ok(Self { pb })
    }

    /// Same as [`ProgressObserver::new`] but never renders.
    pub fn hidden() -> Result<Self> {
        let observer = Self::new()?;
        observer.pb.set_draw_target(ProgressDrawTarget::hidden());
        Ok(observer)
    }

    /// Merges counted so far in the current run.
    pub fn position(&self) -> u64 {
        self.pb.position()
    }
}

impl TokenizerObserver for ProgressObserver {
    fn on_train_start(&self, _sequence_len: usize, budget: usize) {
        self.pb.reset();
        self.pb.set_length(budget as u64);
    }

    fn on_merge(&self, _pair: TokenPair, _new_token: Token, _freq: TokenFreq) {
        self.pb.inc(1);
    }

    fn on_train_end(&self, summary: &TrainSummary) {
        self.pb.finish_with_message(format!("Done: {}", summary.stop));
    }
}
