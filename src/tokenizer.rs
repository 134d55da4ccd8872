//! Byte-level BPE tokenizer: training, special tokens, encoding and decoding.
//!
//! The encoding pipeline:
//! 1. Split text into special-token literals and ordinary spans.
//! 2. UTF-8 byte conversion for each ordinary span.
//! 3. BPE merge application on the byte sequences.

use std::fmt;

use crate::{
    converter::BPEConverter,
    error::{BpeError, ErrorMode, Result},
    observer::{LogObserver, StopReason, TokenizerObserver, TrainSummary},
    projection::{bytes_to_string, string_to_bytes},
    trainer::BPETrainer,
    types::{BASE_VOCAB_SIZE, Token, TokenPair},
};

/// BPE tokenizer that learns merges from text and converts text ↔ token ids.
///
/// Ids `0..256` are raw bytes. Every merge and every special token takes the
/// next id from one shared counter, so `vocab_size()` is always the number of
/// ids handed out so far.
///
/// # Example
///
/// ```
/// use bytebpe::Tokenizer;
///
/// let mut tokenizer = Tokenizer::new(300)?;
/// tokenizer.register_special_token("<EOS>")?;
/// tokenizer.train("low lower lowest", false);
///
/// let ids = tokenizer.encode("slower<EOS>");
/// assert_eq!(tokenizer.decode(&ids)?, "slower<EOS>");
/// # Ok::<(), bytebpe::BpeError>(())
/// ```
pub struct Tokenizer {
    max_vocab_size: usize,
    next_id: Token,
    converter: BPEConverter,
    observer: Box<dyn TokenizerObserver>,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("max_vocab_size", &self.max_vocab_size)
            .field("next_id", &self.next_id)
            .field("num_merges", &self.converter.num_merges())
            .field("num_special_tokens", &self.converter.specials().len())
            .finish_non_exhaustive()
    }
}

impl Tokenizer {
    /// Creates a tokenizer in base state that reports through [`LogObserver`].
    ///
    /// # Errors
    ///
    /// Returns [`BpeError::Configuration`] if `max_vocab_size` is 256 or
    /// less, since no merge would fit.
    pub fn new(max_vocab_size: usize) -> Result<Self> {
        Self::with_observer(max_vocab_size, LogObserver)
    }

    /// Creates a tokenizer in base state that reports to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`BpeError::Configuration`] if `max_vocab_size` is 256 or less.
    pub fn with_observer(
        max_vocab_size: usize,
        observer: impl TokenizerObserver + 'static,
    ) -> Result<Self> {
        if max_vocab_size <= BASE_VOCAB_SIZE {
            return Err(BpeError::Configuration { max_vocab_size });
        }

        Ok(Self {
            max_vocab_size,
            next_id: BASE_VOCAB_SIZE,
            converter: BPEConverter::new(),
            observer: Box::new(observer),
        })
    }

    /// Replaces the observer.
    pub fn set_observer(&mut self, observer: impl TokenizerObserver + 'static) {
        self.observer = Box::new(observer);
    }

    /// Returns to base state: 256 byte ids, no merges, no special tokens.
    ///
    /// Special tokens are not re-registered; callers register them again.
    pub fn reset(&mut self) {
        self.converter = BPEConverter::new();
        self.next_id = BASE_VOCAB_SIZE;
    }

    /// Registers `literal` as an atomic special token and returns its id.
    ///
    /// Re-registering a known literal returns its existing id and changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BpeError::EmptySpecialToken`] for the empty string.
    pub fn register_special_token(&mut self, literal: &str) -> Result<Token> {
        if literal.is_empty() {
            return Err(BpeError::EmptySpecialToken);
        }

        if let Some(token) = self.converter.special_id(literal) {
            return Ok(token);
        }

        let token = self.allocate_id();
        self.converter.add_special(literal, token);
        self.observer.on_special_token(literal, token);

        Ok(token)
    }

    /// Learns merges from `text` until the vocabulary is full.
    ///
    /// With `stop_early`, training also stops once the most frequent pair
    /// occurs only once. Calling `train` again keeps existing merges: the new
    /// text is first encoded with them and learning continues from there.
    /// Special-token literals inside `text` are treated as plain text.
    pub fn train(&mut self, text: &str, stop_early: bool) -> TrainSummary {
        let tokens = self.converter.encode(string_to_bytes(text));
        let mut trainer = BPETrainer::new(&tokens);

        let budget = self.max_vocab_size.saturating_sub(self.next_id);
        self.observer.on_train_start(trainer.len(), budget);

        let mut merges = 0;
        let stop = loop {
            if self.next_id >= self.max_vocab_size {
                break StopReason::VocabFull;
            }

            let Some((pair, freq)) = trainer.most_frequent_pair() else {
                break StopReason::Exhausted;
            };

            if stop_early && freq == 1 {
                break StopReason::NoCompressionGain;
            }

            let new_token = self.allocate_id();
            trainer.merge(pair, new_token);
            self.converter.add_merge(pair, new_token);
            self.observer.on_merge(pair, new_token, freq);
            merges += 1;
        };

        let summary = TrainSummary {
            merges,
            vocab_size: self.vocab_size(),
            stop,
        };
        self.observer.on_train_end(&summary);

        summary
    }

    /// Encodes text into token ids, emitting special tokens atomically.
    ///
    /// At each point the earliest occurrence of any registered literal is cut
    /// out (longest literal on a tie); the spans in between go through the
    /// byte → BPE pipeline. Bytes never seen during training stay as their
    /// base ids, so every string is encodable.
    pub fn encode(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }

        if self.converter.specials().is_empty() {
            return self.encode_ordinary(text);
        }

        // pre-allocate: on average, BPE compresses text by 30-40%
        let mut all_tokens = Vec::with_capacity(text.len() / 3);

        for (segment, special_id) in self.split_on_special_tokens(text) {
            match special_id {
                Some(id) => all_tokens.push(id),
                None => all_tokens.extend(self.encode_ordinary(segment)),
            }
        }

        all_tokens
    }

    /// Encodes text as one byte stream, ignoring special tokens.
    pub fn encode_ordinary(&self, text: &str) -> Vec<Token> {
        self.converter.encode(string_to_bytes(text))
    }

    /// Decodes token ids back into text, failing on invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`BpeError::UnknownTokenId`] if an id was never allocated by
    /// this tokenizer, or [`BpeError::Encoding`] if the bytes are not valid
    /// UTF-8 (possible when ids are cut mid-character).
    pub fn decode(&self, ids: &[Token]) -> Result<String> {
        self.decode_with(ids, ErrorMode::Strict)
    }

    /// Decodes token ids with the given handling of invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`BpeError::UnknownTokenId`] for unknown ids, or
    /// [`BpeError::Encoding`] on invalid UTF-8 in `Strict` mode.
    pub fn decode_with(&self, ids: &[Token], errors: ErrorMode) -> Result<String> {
        let bytes = self.converter.decode(ids)?;
        bytes_to_string(bytes, errors)
    }

    /// Total ids allocated: base bytes, merges and special tokens.
    pub fn vocab_size(&self) -> usize {
        self.next_id
    }

    /// Vocabulary ceiling given at construction; `reset` keeps it.
    pub fn max_vocab_size(&self) -> usize {
        self.max_vocab_size
    }

    /// Number of learned merge rules.
    pub fn num_merges(&self) -> usize {
        self.converter.num_merges()
    }

    /// Merge rules as `(pair, new_id)` in the order they were learned.
    pub fn merges(&self) -> impl Iterator<Item = (TokenPair, Token)> + '_ {
        self.converter.merge_history().iter().copied()
    }

    /// Id created by merging `pair`, if such a rule was learned.
    pub fn merge_rule(&self, pair: TokenPair) -> Option<Token> {
        self.converter.merge_rule(pair)
    }

    /// Byte value of a base or composite token. Special tokens return `None`.
    pub fn token_bytes(&self, token: Token) -> Option<&[u8]> {
        self.converter.token_bytes(token)
    }

    /// Number of base and composite vocabulary entries.
    pub fn vocab_len(&self) -> usize {
        self.converter.vocab_len()
    }

    /// Registered special tokens as `(literal, id)`, sorted by id.
    pub fn special_tokens(&self) -> Vec<(&str, Token)> {
        let mut specials: Vec<(&str, Token)> = self
            .converter
            .specials()
            .iter()
            .map(|(literal, &token)| (literal.as_str(), token))
            .collect();
        specials.sort_by_key(|&(_, token)| token);
        specials
    }

    /// Id of a registered special token.
    pub fn special_token_id(&self, literal: &str) -> Option<Token> {
        self.converter.special_id(literal)
    }

    fn allocate_id(&mut self) -> Token {
        let token = self.next_id;
        self.next_id += 1;
        token
    }

    /// Segments text into alternating normal and special-token spans.
    ///
    /// Scans for the earliest occurrence of any registered literal; when two
    /// literals start at the same position the longer one wins. Empty normal
    /// spans (text starting with a special token, or two consecutive special
    /// tokens) are not emitted.
    ///
    /// # Returns
    ///
    /// A list of `(chunk, Option<token_id>)` pairs where the second element
    /// is `None` for normal text and `Some(id)` for a special token.
    fn split_on_special_tokens<'a>(&self, text: &'a str) -> Vec<(&'a str, Option<Token>)> {
        let specials: Vec<(&str, Token)> = self
            .converter
            .specials()
            .iter()
            .map(|(literal, &id)| (literal.as_str(), id))
            .collect();

        // next known start of each literal; refreshed only once the cursor passes it
        let mut next_at: Vec<Option<usize>> = specials
            .iter()
            .map(|&(literal, _)| text.find(literal))
            .collect();

        let mut segments = Vec::new();
        let mut cursor = 0;

        while cursor < text.len() {
            for (slot, &(literal, _)) in next_at.iter_mut().zip(&specials) {
                if let Some(at) = *slot
                    && at < cursor
                {
                    *slot = text[cursor..].find(literal).map(|offset| cursor + offset);
                }
            }

            // (start, literal length, id) of the next special token
            let next_match = next_at
                .iter()
                .zip(&specials)
                .filter_map(|(slot, &(literal, id))| slot.map(|at| (at, literal.len(), id)))
                .min_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

            let Some((at, len, id)) = next_match else {
                segments.push((&text[cursor..], None));
                break;
            };

            if at > cursor {
                segments.push((&text[cursor..at], None));
            }
            segments.push((&text[at..at + len], Some(id)));
            cursor = at + len;
        }

        segments
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{observer::NoopObserver, pairs::merge_pair};

    const CORPUS: &str = "the quick brown fox jumps over the lazy dog. \
        the lazy dog sleeps while the quick brown fox runs. \
        a quick fox and a lazy dog are the best of friends, the end.";

    fn make_tokenizer(max_vocab_size: usize) -> Tokenizer {
        Tokenizer::with_observer(max_vocab_size, NoopObserver).expect("size above 256")
    }

    #[derive(Default)]
    struct Recorder {
        merges: AtomicUsize,
        specials: Mutex<Vec<(String, Token)>>,
        summaries: Mutex<Vec<TrainSummary>>,
    }

    impl TokenizerObserver for Arc<Recorder> {
        fn on_special_token(&self, literal: &str, token: Token) {
            if let Ok(mut specials) = self.specials.lock() {
                specials.push((literal.to_owned(), token));
            }
        }

        fn on_merge(&self, _pair: TokenPair, _new_token: Token, _freq: usize) {
            self.merges.fetch_add(1, Ordering::SeqCst);
        }

        fn on_train_end(&self, summary: &TrainSummary) {
            if let Ok(mut summaries) = self.summaries.lock() {
                summaries.push(*summary);
            }
        }
    }

    #[test]
    fn test_new_rejects_small_vocab() {
        assert!(matches!(
            Tokenizer::new(255),
            Err(BpeError::Configuration { max_vocab_size: 255 })
        ));
        assert!(matches!(
            Tokenizer::new(256),
            Err(BpeError::Configuration { max_vocab_size: 256 })
        ));
        assert!(Tokenizer::new(257).is_ok());
    }

    #[test]
    fn test_base_state() {
        let tok = make_tokenizer(300);
        assert_eq!(tok.vocab_size(), 256);
        assert_eq!(tok.vocab_len(), 256);
        assert_eq!(tok.num_merges(), 0);
        assert!(tok.special_tokens().is_empty());
        assert_eq!(tok.token_bytes(65), Some(&b"A"[..]));
    }

    #[test]
    fn test_empty_input() {
        let tok = make_tokenizer(300);
        assert_eq!(tok.encode(""), Vec::<Token>::new());
        assert_eq!(tok.decode(&[]).expect("empty decode"), "");
    }

    #[test]
    fn test_encode_untrained_is_raw_bytes() {
        let tok = make_tokenizer(300);
        assert_eq!(tok.encode("ab cd"), vec![97, 98, 32, 99, 100]);
    }

    #[test]
    fn test_train_fills_vocab() {
        let mut tok = make_tokenizer(300);
        let summary = tok.train(CORPUS, false);

        assert_eq!(summary.stop, StopReason::VocabFull);
        assert_eq!(summary.merges, 44);
        assert_eq!(tok.vocab_size(), 300);
        assert_eq!(tok.vocab_size(), tok.vocab_len() + tok.special_tokens().len());
    }

    #[test]
    fn test_train_first_merge_is_most_frequent_pair() {
        let mut tok = make_tokenizer(257);
        tok.train("aaabdaaabac", false);

        // (97, 97) occurs four times.
        assert_eq!(tok.merges().collect::<Vec<_>>(), vec![(TokenPair(97, 97), 256)]);
        assert_eq!(tok.token_bytes(256), Some(&b"aa"[..]));
    }

    #[test]
    fn test_train_stop_early() {
        let mut tok = make_tokenizer(1000);
        let summary = tok.train("abcabc xyz", true);

        // "ab" then "abc" repeat; everything after occurs once.
        assert_eq!(summary.stop, StopReason::NoCompressionGain);
        assert_eq!(summary.merges, 2);
        assert_eq!(tok.vocab_size(), 258);
        assert_eq!(tok.encode("abc"), vec![257]);
    }

    #[test]
    fn test_train_exhausts_short_text() {
        let mut tok = make_tokenizer(1000);
        let summary = tok.train("abcd", false);

        assert_eq!(summary.stop, StopReason::Exhausted);
        assert_eq!(summary.merges, 3);
        assert_eq!(tok.encode("abcd"), vec![258]);

        let summary = tok.train("", false);
        assert_eq!(summary.merges, 0);
        assert_eq!(summary.stop, StopReason::Exhausted);
    }

    #[test]
    fn test_train_is_deterministic() {
        let mut first = make_tokenizer(320);
        let mut second = make_tokenizer(320);
        first.train(CORPUS, false);
        second.train(CORPUS, false);

        assert_eq!(
            first.merges().collect::<Vec<_>>(),
            second.merges().collect::<Vec<_>>()
        );
    }

    /// Left-to-right scan over the learned rules: the first pair with a rule
    /// is merged everywhere and the scan stays put, until a pass finds nothing.
    fn scan_encode(tok: &Tokenizer, text: &str) -> Vec<Token> {
        let mut tokens = string_to_bytes(text);
        let mut changed = true;
        while changed {
            changed = false;
            let mut i = 0;
            while i + 1 < tokens.len() {
                let pair = TokenPair(tokens[i], tokens[i + 1]);
                if let Some(token) = tok.merge_rule(pair) {
                    tokens = merge_pair(&tokens, pair, token);
                    changed = true;
                } else {
                    i += 1;
                }
            }
        }
        tokens
    }

    #[test]
    fn test_encode_scans_left_to_right() {
        let mut tok = make_tokenizer(1000);
        tok.train("bcbcbcbc xy abab", true);

        assert_eq!(
            tok.merges().collect::<Vec<_>>(),
            vec![
                (TokenPair(98, 99), 256),
                (TokenPair(256, 256), 257),
                (TokenPair(97, 98), 258),
            ]
        );
        // (b, c) was learned first, but (a, b) is the first pair the scan meets
        assert_eq!(tok.encode("abc"), vec![258, 99]);
        assert_eq!(tok.encode("abcbc"), vec![258, 99, 256]);
    }

    #[test]
    fn test_encode_matches_scan_reference() {
        let mut tok = make_tokenizer(330);
        tok.train(CORPUS, false);

        for text in [
            CORPUS,
            "the quickest brown foxes",
            "a dog, a fox and the end of the lazy sleeps",
            "",
        ] {
            assert_eq!(tok.encode(text), scan_encode(&tok, text), "text {text:?}");
        }
    }

    #[test]
    fn test_retrain_accumulates_without_duplicate_rules() {
        let mut tok = make_tokenizer(400);
        let first = tok.train("hello hello hello", true);
        let learned = tok.num_merges();
        assert_eq!(first.merges, learned);

        tok.train("hello world, hello world", true);
        assert!(tok.num_merges() > learned);

        let mut pairs: Vec<TokenPair> = tok.merges().map(|(pair, _)| pair).collect();
        let total = pairs.len();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), total);

        let ids: Vec<Token> = tok.merges().map(|(_, id)| id).collect();
        let expected: Vec<Token> = (256..256 + total).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_register_special_token_is_idempotent() {
        let mut tok = make_tokenizer(300);
        let bos = tok.register_special_token("<BOS>").expect("valid literal");
        let eos = tok.register_special_token("<EOS>").expect("valid literal");
        assert_eq!((bos, eos), (256, 257));

        assert_eq!(tok.register_special_token("<BOS>").expect("valid literal"), 256);
        assert_eq!(tok.vocab_size(), 258);
        assert_eq!(tok.special_token_id("<EOS>"), Some(257));
        assert_eq!(tok.special_tokens(), vec![("<BOS>", 256), ("<EOS>", 257)]);
    }

    #[test]
    fn test_register_empty_special_token_fails() {
        let mut tok = make_tokenizer(300);
        assert!(matches!(
            tok.register_special_token(""),
            Err(BpeError::EmptySpecialToken)
        ));
        assert_eq!(tok.vocab_size(), 256);
    }

    #[test]
    fn test_special_ids_never_collide_with_merges() {
        let mut tok = make_tokenizer(280);
        tok.register_special_token("<BOS>").expect("valid literal");
        tok.train(CORPUS, false);
        tok.register_special_token("<EOS>").expect("valid literal");

        assert_eq!(tok.special_token_id("<BOS>"), Some(256));
        assert_eq!(tok.special_token_id("<EOS>"), Some(280));
        assert!(tok.merges().all(|(_, id)| id != 256 && id != 280));
        assert_eq!(tok.vocab_size(), tok.vocab_len() + tok.special_tokens().len());
    }

    #[test]
    fn test_encode_with_special_tokens() {
        let mut tok = make_tokenizer(300);
        tok.register_special_token("<BOS>").expect("valid literal");
        tok.register_special_token("<EOS>").expect("valid literal");

        assert_eq!(tok.encode("<BOS>hi<EOS>"), vec![256, 104, 105, 257]);
        assert_eq!(tok.encode("<EOS><EOS>"), vec![257, 257]);
        assert_eq!(tok.encode_ordinary("<EOS>").len(), 5);
    }

    #[test]
    fn test_split_prefers_longest_literal() {
        let mut tok = make_tokenizer(300);
        let short = tok.register_special_token("<|end|>").expect("valid literal");
        let long = tok.register_special_token("<|end|>!").expect("valid literal");

        assert_eq!(tok.encode("a<|end|>!b"), vec![97, long, 98]);
        assert_eq!(tok.encode("a<|end|>b"), vec![97, short, 98]);
    }

    #[test]
    fn test_split_many_occurrences() {
        let mut tok = make_tokenizer(300);
        let eos = tok.register_special_token("<EOS>").expect("valid literal");
        // never occurs, so its cached position stays empty
        tok.register_special_token("<PAD>").expect("valid literal");

        let text = "ab<EOS>".repeat(2000);
        let ids = tok.encode(&text);

        assert_eq!(ids.len(), 6000);
        assert!(ids.chunks(3).all(|chunk| chunk == [97, 98, eos]));
        assert_eq!(tok.decode(&ids).expect("round trip"), text);
    }

    #[test]
    fn test_split_earliest_literal_wins() {
        let mut tok = make_tokenizer(300);
        tok.register_special_token("bc").expect("valid literal");
        let ab = tok.register_special_token("ab").expect("valid literal");

        // "ab" starts first and consumes the "b" that "bc" would need.
        assert_eq!(tok.encode("abc"), vec![ab, 99]);
    }

    #[test]
    fn test_round_trip_after_training() {
        let mut tok = make_tokenizer(384);
        tok.register_special_token("<BOS>").expect("valid literal");
        tok.register_special_token("<EOS>").expect("valid literal");
        tok.train(CORPUS, false);

        for text in [
            "some regular sentence.",
            "<BOS>now with special tokens<EOS>",
            "😱 didn't appear in the corpus",
            "<BOS><EOS>the lazy dog<BOS",
        ] {
            let ids = tok.encode(text);
            assert_eq!(tok.decode(&ids).expect("round trip"), text);
        }
        assert_eq!(tok.vocab_size(), tok.vocab_len() + tok.special_tokens().len());
    }

    #[test]
    fn test_training_compresses_corpus() {
        let mut tok = make_tokenizer(300);
        tok.train(CORPUS, false);
        assert!(tok.encode(CORPUS).len() < CORPUS.len());
    }

    #[test]
    fn test_decode_unknown_id() {
        let mut tok = make_tokenizer(300);
        tok.train("abab", false);
        assert!(matches!(tok.decode(&[97, 299]), Err(BpeError::UnknownTokenId(299))));
    }

    #[test]
    fn test_decode_split_character() {
        let tok = make_tokenizer(300);
        // 'é' is [0xC3, 0xA9]; decoding only the first byte is invalid UTF-8
        assert!(matches!(tok.decode(&[0xC3]), Err(BpeError::Encoding(_))));
        assert_eq!(
            tok.decode_with(&[0xC3], ErrorMode::Replace).expect("lossy decode"),
            "\u{FFFD}"
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tok = make_tokenizer(300);
        tok.register_special_token("<BOS>").expect("valid literal");
        tok.train(CORPUS, false);
        tok.reset();

        assert_eq!(tok.vocab_size(), 256);
        assert_eq!(tok.num_merges(), 0);
        assert!(tok.special_tokens().is_empty());
        assert_eq!(tok.encode("<BOS>"), string_to_bytes("<BOS>"));
        assert!(matches!(tok.decode(&[256]), Err(BpeError::UnknownTokenId(256))));
        assert_eq!(tok.max_vocab_size(), 300);
    }

    #[test]
    fn test_observer_receives_events() {
        let recorder = Arc::new(Recorder::default());
        let mut tok = Tokenizer::with_observer(270, Arc::clone(&recorder)).expect("valid size");

        tok.register_special_token("<BOS>").expect("valid literal");
        tok.register_special_token("<BOS>").expect("valid literal");
        let summary = tok.train(CORPUS, false);

        assert_eq!(recorder.merges.load(Ordering::SeqCst), 13);
        assert_eq!(summary.merges, 13);
        let specials = recorder.specials.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(specials, vec![(String::from("<BOS>"), 256)]);
        let summaries = recorder.summaries.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(summaries, vec![summary]);
    }

    #[test]
    fn test_set_observer() {
        let recorder = Arc::new(Recorder::default());
        let mut tok = make_tokenizer(260);
        tok.set_observer(Arc::clone(&recorder));
        tok.train(CORPUS, false);
        assert_eq!(recorder.merges.load(Ordering::SeqCst), 4);
    }
}
