//! Line tokenizer: splits raw text into lowercase word tokens and drops
//! fragments that cannot be part of a phrase.

/// Word filters applied after splitting on non-alphanumeric runs and
/// lowercasing. A fragment survives only if all of these hold:
///
/// - length at least 2
/// - not entirely digits
/// - no digit directly adjacent to a letter, in either order
/// - not a single character repeated across the whole fragment
/// - (strict only) no character repeated more than twice in a row
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    strict: bool,
}

impl Tokenizer {
    /// Strict rules; the default for the directory pipeline.
    pub fn strict() -> Self {
        Tokenizer { strict: true }
    }

    /// Relaxed rules: long in-word character runs are kept.
    pub fn relaxed() -> Self {
        Tokenizer { strict: false }
    }

    /// Split a raw line into filtered, lowercased tokens.
    pub fn tokenize(&self, line: &str) -> Vec<String> {
        line.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|frag| !frag.is_empty())
            .map(|frag| frag.to_ascii_lowercase())
            .filter(|word| self.keep(word))
            .collect()
    }

    fn keep(&self, word: &str) -> bool {
        let bytes = word.as_bytes();
        if bytes.len() < 2 {
            return false;
        }
        if bytes.iter().all(u8::is_ascii_digit) {
            return false;
        }
        let digit_letter_mix = bytes.windows(2).any(|w| {
            (w[0].is_ascii_digit() && w[1].is_ascii_alphabetic())
                || (w[0].is_ascii_alphabetic() && w[1].is_ascii_digit())
        });
        if digit_letter_mix {
            return false;
        }
        if bytes.iter().all(|&b| b == bytes[0]) {
            return false;
        }
        if self.strict && has_long_run(bytes) {
            return false;
        }
        true
    }
}

/// True if any byte repeats more than twice in a row.
fn has_long_run(bytes: &[u8]) -> bool {
    bytes.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}
