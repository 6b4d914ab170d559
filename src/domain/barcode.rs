//! Bar code validation.
//!
//! Inbound payloads are taken as sent; anything shorter than [`MIN_BAR_CODE_LEN`]
//! characters or containing a non-digit is discarded before any lookup.

use std::fmt;

use super::error::DomainError;

/// Shortest accepted bar code (EAN-8).
pub const MIN_BAR_CODE_LEN: usize = 8;

/// Returns `true` when `candidate` looks like a bar code.
pub fn is_possible_bar_code(candidate: &str) -> bool {
    candidate.len() >= MIN_BAR_CODE_LEN && candidate.bytes().all(|byte| byte.is_ascii_digit())
}

/// A validated bar code. Only decimal ASCII digits, at least eight of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BarCode(String);

impl BarCode {
    pub fn parse(candidate: &str) -> Result<Self, DomainError> {
        if is_possible_bar_code(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(DomainError::invalid_bar_code(candidate))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BarCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BarCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_digit_strings_of_eight_or_more() {
        for candidate in ["12345678", "4029764001401", "0000000000000000000"] {
            assert!(is_possible_bar_code(candidate), "{candidate} should pass");
        }
    }

    #[test]
    fn rejects_short_strings() {
        for candidate in ["", "1", "123", "1234567"] {
            assert!(!is_possible_bar_code(candidate), "{candidate} should fail");
        }
    }

    #[test]
    fn rejects_non_digits() {
        for candidate in [
            "1234567a",
            "4029764 001401",
            "-12345678",
            "12345678\n",
            "１２３４５６７８",
            "१२३४५६७८९",
        ] {
            assert!(!is_possible_bar_code(candidate), "{candidate:?} should fail");
        }
    }

    #[test]
    fn parse_preserves_input_verbatim() {
        let code = BarCode::parse("0004029764001401").expect("valid bar code");
        assert_eq!(code.as_str(), "0004029764001401");
        assert_eq!(code.to_string(), "0004029764001401");
    }

    #[test]
    fn parse_reports_rejected_input() {
        let err = BarCode::parse("123").expect_err("too short");
        assert_eq!(err, DomainError::invalid_bar_code("123"));
    }
}
