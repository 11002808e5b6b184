//! ANSI escape stripping
//!
//! CI runners frequently force color output. Every line is stripped before
//! matching so that patterns never need to account for escape sequences.

use std::borrow::Cow;

const ESC: u8 = 0x1b;

/// Whether the text contains an escape byte
#[inline]
pub fn contains_ansi(text: &str) -> bool {
    memchr::memchr(ESC, text.as_bytes()).is_some()
}

/// Remove ANSI escape sequences
///
/// Returns the input unchanged (borrowed) when it holds no escape byte,
/// which is the common case.
#[inline]
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if !contains_ansi(text) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(strip_ansi_escapes::strip_str(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        let out = strip_ansi("main.go:10:5: undefined: x");
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_color_codes_removed() {
        let out = strip_ansi("\x1b[31merror\x1b[0m: something failed");
        assert_eq!(out, "error: something failed");
    }

    #[test]
    fn test_bold_and_reset() {
        let out = strip_ansi("\x1b[1m\x1b[91merror[E0425]\x1b[0m\x1b[1m: cannot find value\x1b[0m");
        assert_eq!(out, "error[E0425]: cannot find value");
    }
}
