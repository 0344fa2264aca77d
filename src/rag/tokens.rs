//! Character-count token estimation.

/// Approximate the token cost of `text` as `ceil(chars / 4)`.
///
/// A fixed-divisor heuristic, not a real tokenizer; good enough for the
/// usage ledger, which is advisory rather than billing-grade.
pub fn estimate_tokens(text: &str) -> i64 {
    text.chars().count().div_ceil(4) as i64
}
