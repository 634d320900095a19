//! Session id validation
//!
//! Ids arrive from cookies and other untrusted input and end up inside store
//! keys. [`SessionId`] can only be built through [`sanitize_session_id`] (or
//! its `FromStr` twin), so every key is derived from a checked id.

use crate::constants::{REDACTED_PREFIX_LEN, SESSION_ID_PATTERN};
use crate::error::{redact, SessionError};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::warn;

static SESSION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(SESSION_ID_PATTERN).unwrap_or_else(|e| panic!("invalid session id pattern: {e}"))
});

/// A validated session id: 26-128 ASCII letters and digits
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First characters of the id followed by `...`, safe to log
    pub fn redacted(&self) -> String {
        redact(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionId").field(&self.redacted()).finish()
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if SESSION_ID_RE.is_match(trimmed) {
            Ok(SessionId(trimmed.to_string()))
        } else {
            Err(SessionError::InvalidSessionId {
                prefix: diagnostic_prefix(trimmed),
                length: trimmed.len(),
            })
        }
    }
}

fn diagnostic_prefix(candidate: &str) -> String {
    candidate
        .chars()
        .take(REDACTED_PREFIX_LEN)
        .collect::<String>()
        .escape_debug()
        .to_string()
}

/// Validate an untrusted session id.
///
/// Surrounding whitespace is trimmed. Anything not matching
/// `^[A-Za-z0-9]{26,128}$` yields `None`; the rejection is logged with a short
/// prefix and the length only.
pub fn sanitize_session_id(candidate: Option<&str>) -> Option<SessionId> {
    let candidate = candidate?;
    if candidate.is_empty() {
        return None;
    }

    match candidate.parse::<SessionId>() {
        Ok(id) => Some(id),
        Err(SessionError::InvalidSessionId { prefix, length }) => {
            warn!(prefix = %prefix, length, "Invalid session id format rejected");
            None
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(candidate: &str) -> bool {
        sanitize_session_id(Some(candidate)).is_some()
    }

    #[test]
    fn test_valid_ids() {
        let id = "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6";
        assert_eq!(sanitize_session_id(Some(id)).unwrap().as_str(), id);
        assert!(accepts("abcdef123456ghijkl78901234"));
        assert!(accepts(&"a".repeat(128)));
        assert!(accepts("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let id = sanitize_session_id(Some("  a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6\n")).unwrap();
        assert_eq!(id.as_str(), "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6");
    }

    #[test]
    fn test_length_bounds() {
        assert!(!accepts("abc123"));
        assert!(!accepts(&"a".repeat(25)));
        assert!(!accepts(&"a".repeat(129)));
    }

    #[test]
    fn test_missing_or_blank() {
        assert!(sanitize_session_id(None).is_none());
        assert!(!accepts(""));
        assert!(!accepts("   "));
    }

    #[test]
    fn test_hostile_input_rejected() {
        let padding = "a".repeat(26);
        let cases = [
            "abc123<script>".to_string(),
            "abc123' OR '1'='1".to_string(),
            "abc123; rm -rf /".to_string(),
            "../../../etc/passwd".to_string(),
            format!("{padding},comma-dash"),
            format!("{padding}.dot"),
            format!("{padding}\0"),
            format!("abc\0{padding}"),
            format!("{padding}\r\nSET x y"),
            format!("{padding}é"),
            format!("{padding}_LOCK"),
        ];
        for case in &cases {
            assert!(!accepts(case), "Should reject: {:?}", case);
        }
    }

    #[test]
    fn test_from_str_error_carries_prefix_and_length() {
        match "abc123<script>".parse::<SessionId>() {
            Err(SessionError::InvalidSessionId { prefix, length }) => {
                assert_eq!(prefix, "abc123<s");
                assert_eq!(length, 14);
            }
            other => panic!("Expected InvalidSessionId, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_is_redacted() {
        let id: SessionId = "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6".parse().unwrap();
        let rendered = format!("{:?}", id);
        assert!(rendered.contains("a1b2c3d4..."));
        assert!(!rendered.contains("o5p6"));
    }
}
