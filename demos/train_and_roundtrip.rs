use bytebpe::{ProgressObserver, Tokenizer};

fn main() -> Result<(), bytebpe::BpeError> {
    let corpus = "the quick brown fox jumps over the lazy dog. \
                  the lazy dog sleeps while the quick brown fox runs.";

    let mut tokenizer = Tokenizer::with_observer(320, ProgressObserver::new()?)?;
    tokenizer.register_special_token("<BOS>")?;
    tokenizer.register_special_token("<EOS>")?;

    let summary = tokenizer.train(corpus, true);
    println!(
        "Learned {} merges, vocab size {} ({})",
        summary.merges, summary.vocab_size, summary.stop
    );

    for (pair, token) in tokenizer.merges().take(5) {
        let bytes = tokenizer.token_bytes(token).unwrap_or_default();
        println!("  {pair} -> {token} {:?}", String::from_utf8_lossy(bytes));
    }

    let text = "<BOS>the quick dog 😱<EOS>";
    let ids = tokenizer.encode(text);
    println!("\nEncoded {text:?} into {} ids: {ids:?}", ids.len());
    println!("Decoded: {:?}", tokenizer.decode(&ids)?);

    Ok(())
}
