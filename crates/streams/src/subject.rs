//! Subjects are dot-delimited routing keys. Patterns may contain wildcards:
//! - `*` matches exactly one token
//! - `>` matches one or more tokens and must be the last token

use thiserror::Error;

/// Token delimiter.
pub const DELIMITER: char = '.';

/// Single-token wildcard.
pub const WILDCARD_ONE: &str = "*";

/// Trailing multi-token wildcard.
pub const WILDCARD_TAIL: &str = ">";

const MAX_SUBJECT_LEN: usize = 1024;
const MAX_STREAM_NAME_LEN: usize = 256;

/// Validation error for subject patterns and stream names.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubjectValidationError {
    /// Pattern or name is empty.
    #[error("must not be empty")]
    Empty,

    /// Pattern or name contains characters the broker does not accept.
    #[error("invalid characters in `{value}`: {chars:?}")]
    InvalidCharacters {
        /// The rejected value.
        value: String,
        /// The offending characters.
        chars: String,
    },

    /// Pattern has an empty token or misplaced wildcard.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Pattern or name is too long.
    #[error("too long: {len} bytes (max {max})")]
    TooLong {
        /// Actual length.
        len: usize,
        /// Allowed length.
        max: usize,
    },
}

/// Splits a subject into its tokens.
pub fn tokens(subject: &str) -> impl Iterator<Item = &str> {
    subject.split(DELIMITER)
}

/// Check if a concrete subject matches a pattern.
#[must_use]
pub fn subject_matches_pattern(subject: &str, pattern: &str) -> bool {
    let mut subject_tokens = tokens(subject);
    let mut pattern_tokens = tokens(pattern);

    loop {
        match (subject_tokens.next(), pattern_tokens.next()) {
            (None, None) => return true,
            (Some(_), Some(WILDCARD_TAIL)) => return true,
            (Some(s), Some(p)) if p == WILDCARD_ONE || p == s => {}
            _ => return false,
        }
    }
}

/// Check if two patterns can match at least one common subject.
///
/// Symmetric: `patterns_overlap(a, b) == patterns_overlap(b, a)`.
#[must_use]
pub fn patterns_overlap(a: &str, b: &str) -> bool {
    let mut left = tokens(a);
    let mut right = tokens(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (None, Some(_)) | (Some(_), None) => return false,
            (Some(WILDCARD_TAIL), Some(_)) | (Some(_), Some(WILDCARD_TAIL)) => return true,
            (Some(l), Some(r)) => {
                if l != r && l != WILDCARD_ONE && r != WILDCARD_ONE {
                    return false;
                }
            }
        }
    }
}

/// The subjects a stream registers to claim everything under `prefix`.
///
/// `orders.*` claims `orders.*` and `orders.*.>`; a prefix already ending in
/// `>` claims only itself.
#[must_use]
pub fn claimed_subjects(prefix: &str) -> Vec<String> {
    if prefix == WILDCARD_TAIL || prefix.ends_with(".>") {
        vec![prefix.to_string()]
    } else {
        vec![prefix.to_string(), format!("{prefix}{DELIMITER}{WILDCARD_TAIL}")]
    }
}

/// Returns the first `(ours, theirs)` pair of overlapping patterns.
#[must_use]
pub fn find_overlap<'a>(ours: &'a [String], theirs: &'a [String]) -> Option<(&'a str, &'a str)> {
    ours.iter().find_map(|o| {
        theirs
            .iter()
            .find(|t| patterns_overlap(o, t))
            .map(|t| (o.as_str(), t.as_str()))
    })
}

/// Validate a subject pattern.
///
/// # Errors
///
/// Returns `SubjectValidationError` if the pattern is invalid.
pub fn validate_subject_pattern(pattern: &str) -> Result<(), SubjectValidationError> {
    if pattern.is_empty() {
        return Err(SubjectValidationError::Empty);
    }

    if pattern.len() > MAX_SUBJECT_LEN {
        return Err(SubjectValidationError::TooLong {
            len: pattern.len(),
            max: MAX_SUBJECT_LEN,
        });
    }

    let invalid_chars: String = pattern.chars().filter(|c| c.is_whitespace()).collect();
    if !invalid_chars.is_empty() {
        return Err(SubjectValidationError::InvalidCharacters {
            value: pattern.to_string(),
            chars: invalid_chars,
        });
    }

    let invalid = |reason| SubjectValidationError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    let mut tokens = tokens(pattern).peekable();
    while let Some(token) = tokens.next() {
        if token.is_empty() {
            return Err(invalid("empty token"));
        }

        if token.len() > 1 && (token.contains('*') || token.contains('>')) {
            return Err(invalid("wildcards must be whole tokens"));
        }

        if token == WILDCARD_TAIL && tokens.peek().is_some() {
            return Err(invalid("'>' must be the last token"));
        }
    }

    Ok(())
}

/// Validate a stream name.
///
/// # Errors
///
/// Returns `SubjectValidationError` if the name is invalid.
pub fn validate_stream_name(name: &str) -> Result<(), SubjectValidationError> {
    if name.is_empty() {
        return Err(SubjectValidationError::Empty);
    }

    if name.len() > MAX_STREAM_NAME_LEN {
        return Err(SubjectValidationError::TooLong {
            len: name.len(),
            max: MAX_STREAM_NAME_LEN,
        });
    }

    let invalid_chars: String = name
        .chars()
        .filter(|&c| c.is_whitespace() || matches!(c, '.' | '*' | '>' | '/' | '\\'))
        .collect();

    if !invalid_chars.is_empty() {
        return Err(SubjectValidationError::InvalidCharacters {
            value: name.to_string(),
            chars: invalid_chars,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(subject_matches_pattern("orders.new", "orders.new"));
        assert!(!subject_matches_pattern("orders.new", "orders.old"));
    }

    #[test]
    fn test_single_wildcard() {
        assert!(subject_matches_pattern("orders.new", "orders.*"));
        assert!(subject_matches_pattern("users.123", "users.*"));
        assert!(!subject_matches_pattern("orders.new.item", "orders.*"));
        assert!(!subject_matches_pattern("orders", "orders.*"));
    }

    #[test]
    fn test_tail_wildcard() {
        assert!(subject_matches_pattern("orders.new", "orders.>"));
        assert!(subject_matches_pattern("orders.new.item.urgent", "orders.>"));
        assert!(subject_matches_pattern("orders.us.new", "orders.*.>"));
        assert!(!subject_matches_pattern("orders", "orders.>"));
        assert!(!subject_matches_pattern("orders.new", "orders.*.>"));
        assert!(!subject_matches_pattern("users.new", "orders.>"));
    }

    #[test]
    fn test_overlap_literal() {
        assert!(patterns_overlap("a.b.c", "a.b.c"));
        assert!(!patterns_overlap("a.b.c", "a.b.d"));
        assert!(!patterns_overlap("a.b", "a.b.c"));
    }

    #[test]
    fn test_overlap_wildcards() {
        assert!(patterns_overlap("a.*", "a.b"));
        assert!(patterns_overlap("*.b", "a.*"));
        assert!(patterns_overlap("a.*.>", "a.b.c"));
        assert!(patterns_overlap("a.>", "a.*.c.d"));
        assert!(patterns_overlap(">", "anything.at.all"));
        assert!(!patterns_overlap("a.*", "a.b.c"));
        assert!(!patterns_overlap("a.>", "a"));
        assert!(!patterns_overlap("a.>", "b.>"));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let patterns = [
            "a", "a.b", "a.*", "a.>", "*.b", "a.*.c", "a.b.>", ">", "x.y", "*",
        ];

        for a in patterns {
            for b in patterns {
                assert_eq!(patterns_overlap(a, b), patterns_overlap(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_claimed_subjects() {
        assert_eq!(
            claimed_subjects("com.acme.orders.*"),
            vec!["com.acme.orders.*", "com.acme.orders.*.>"]
        );
        assert_eq!(claimed_subjects("com.acme.>"), vec!["com.acme.>"]);
        assert_eq!(claimed_subjects(">"), vec![">"]);
    }

    #[test]
    fn test_claimed_prefixes_overlap_when_nested() {
        let parent = claimed_subjects("com.example.X.*");
        let child = claimed_subjects("com.example.X.sub.*");
        assert_eq!(
            find_overlap(&child, &parent),
            Some(("com.example.X.sub.*", "com.example.X.*.>"))
        );

        let a = claimed_subjects("com.example.A.*");
        let b = claimed_subjects("com.example.B.*");
        assert_eq!(find_overlap(&a, &b), None);
        assert_eq!(find_overlap(&b, &a), None);
    }

    #[test]
    fn test_validate_subject_pattern() {
        assert!(validate_subject_pattern("com.acme.orders.*").is_ok());
        assert!(validate_subject_pattern("com.acme.>").is_ok());
        assert_eq!(
            validate_subject_pattern(""),
            Err(SubjectValidationError::Empty)
        );
        assert!(matches!(
            validate_subject_pattern("com..orders"),
            Err(SubjectValidationError::InvalidPattern { .. })
        ));
        assert!(matches!(
            validate_subject_pattern("com.>.orders"),
            Err(SubjectValidationError::InvalidPattern { .. })
        ));
        assert!(matches!(
            validate_subject_pattern("com.ord*"),
            Err(SubjectValidationError::InvalidPattern { .. })
        ));
        assert!(matches!(
            validate_subject_pattern("com.acme orders"),
            Err(SubjectValidationError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_subject_pattern(&"a".repeat(MAX_SUBJECT_LEN + 1)),
            Err(SubjectValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_stream_name() {
        assert!(validate_stream_name("orders-v1").is_ok());
        assert!(validate_stream_name("nats_test_1").is_ok());
        assert_eq!(validate_stream_name(""), Err(SubjectValidationError::Empty));

        for name in ["orders.v1", "orders*", "orders>", "a/b", "a\\b", "a b"] {
            assert!(
                matches!(
                    validate_stream_name(name),
                    Err(SubjectValidationError::InvalidCharacters { .. })
                ),
                "{name} should be rejected"
            );
        }
    }
}
