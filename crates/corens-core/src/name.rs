//! Name normalization and lookup key derivation
//!
//! User input is trimmed, lowercased and suffix-qualified before it is
//! encoded into the fixed-width key the Registry indexes records by.
//! Names whose encoded form does not fit the key are rejected, never
//! truncated or hashed.

use std::fmt;

use serde::Serialize;

use crate::constants::{DEFAULT_SUFFIX, LOOKUP_KEY_BYTES};
use crate::{Error, LookupKey};

/// Normalize raw input against the default `.core` suffix
pub fn normalize(raw: &str) -> String {
    normalize_with_suffix(raw, DEFAULT_SUFFIX)
}

/// Trim, lowercase and append `suffix` if it is not already present.
///
/// Idempotent: normalizing an already normalized name returns it unchanged.
pub fn normalize_with_suffix(raw: &str, suffix: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    let suffix = suffix.to_lowercase();
    if trimmed.ends_with(&suffix) {
        trimmed
    } else {
        format!("{}{}", trimmed, suffix)
    }
}

/// Encode a normalized name into its fixed-width lookup key
pub fn lookup_key(normalized: &str) -> Result<LookupKey, Error> {
    ethers::utils::format_bytes32_string(normalized)
        .map(LookupKey)
        .map_err(|_| Error::EncodingTooLong {
            name: normalized.to_string(),
            len: normalized.len(),
            max: LOOKUP_KEY_BYTES,
        })
}

/// A validated, suffix-qualified name together with its lookup key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainName {
    normalized: String,
    key: LookupKey,
}

impl DomainName {
    /// Normalize and encode user input.
    ///
    /// # Errors
    /// `InvalidName` when the label before the suffix is empty or contains
    /// whitespace, `EncodingTooLong` when the name does not fit the key.
    pub fn parse(raw: &str, suffix: &str) -> Result<Self, Error> {
        let normalized = normalize_with_suffix(raw, suffix);
        let label = &normalized[..normalized.len() - suffix.to_lowercase().len()];

        if label.is_empty() {
            return Err(Error::InvalidName {
                name: normalized,
                reason: "name is empty".to_string(),
            });
        }
        if label.chars().any(char::is_whitespace) {
            return Err(Error::InvalidName {
                name: normalized,
                reason: "name must not contain whitespace".to_string(),
            });
        }

        let key = lookup_key(&normalized)?;
        Ok(Self { normalized, key })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn key(&self) -> LookupKey {
        self.key
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_suffix() {
        assert_eq!(normalize("alice"), "alice.core");
        assert_eq!(normalize("  Alice  "), "alice.core");
        assert_eq!(normalize("bob.core"), "bob.core");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["alice", " Bob.CORE ", "MiXeD.Core", "x.core.core", "", "  "] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_mixed_case_suffix_is_not_doubled() {
        assert_eq!(normalize("Carol.CoRe"), "carol.core");
    }

    #[test]
    fn test_lookup_key_is_right_padded() {
        let key = lookup_key("alice.core").unwrap();
        assert_eq!(&key.0[..10], b"alice.core");
        assert!(key.0[10..].iter().all(|b| *b == 0));
        assert_eq!(key.to_name().as_deref(), Some("alice.core"));
    }

    #[test]
    fn test_encoding_boundary() {
        // 27-byte label + ".core" = 32 bytes fits exactly
        let fits = format!("{}.core", "a".repeat(27));
        assert!(lookup_key(&fits).is_ok());

        let too_long = format!("{}.core", "a".repeat(28));
        match lookup_key(&too_long) {
            Err(Error::EncodingTooLong { len, max, .. }) => {
                assert_eq!(len, 33);
                assert_eq!(max, 32);
            }
            other => panic!("expected EncodingTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = DomainName::parse("Alice", DEFAULT_SUFFIX).unwrap();
        let b = DomainName::parse(a.as_str(), DEFAULT_SUFFIX).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_parse_rejects_empty_label() {
        assert!(matches!(
            DomainName::parse(".core", DEFAULT_SUFFIX),
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            DomainName::parse("my name", DEFAULT_SUFFIX),
            Err(Error::InvalidName { .. })
        ));
    }
}
