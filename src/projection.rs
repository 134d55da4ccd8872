//! Byte projection between text and base token IDs.
//!
//! Text is projected through UTF-8. Every `&str` is valid UTF-8, so the
//! forward direction cannot fail; only the inverse can.

use crate::{
    error::{ErrorMode, Result},
    types::Token,
};

/// Converts text to its UTF-8 bytes, one base token per byte.
pub fn string_to_bytes(text: &str) -> Vec<Token> {
    text.bytes().map(Token::from).collect()
}

/// Converts bytes back into a string.
///
/// # Errors
///
/// Returns [`BpeError::Encoding`](crate::BpeError::Encoding) if `bytes` is
/// not valid UTF-8 and `errors` is [`ErrorMode::Strict`].
pub fn bytes_to_string(bytes: Vec<u8>, errors: ErrorMode) -> Result<String> {
    match errors {
        ErrorMode::Strict => Ok(String::from_utf8(bytes)?),
        ErrorMode::Replace => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
