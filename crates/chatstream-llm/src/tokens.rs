//! Token counting

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Rough token estimate when no tokenizer is available
///
/// Averages a characters-per-token estimate with a words-per-token one.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    let words = text.split_whitespace().count();

    // Both ratios are small constants; rounding error is irrelevant here.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let estimate = ((chars as f64 / 4.0 + words as f64 / 0.75) / 2.0) as usize;

    estimate
}

/// Token count using the `o200k_base` encoding, falling back to the estimate
pub fn count_openai_tokens(text: &str) -> usize {
    static ENCODING: OnceLock<Option<CoreBPE>> = OnceLock::new();

    let encoding = ENCODING.get_or_init(|| match tiktoken_rs::o200k_base() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load o200k_base encoding, using estimate");
            None
        }
    });

    encoding.as_ref().map_or_else(
        || estimate_tokens(text),
        |bpe| bpe.encode_with_special_tokens(text).len(),
    )
}
