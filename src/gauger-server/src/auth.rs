// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bearer-token check for listener clients.

use std::collections::HashSet;

/// Strip a case-insensitive `Bearer ` prefix, trimming surrounding whitespace.
pub fn strip_bearer(value: &str) -> &str {
    const PREFIX: &str = "bearer ";
    let trimmed = value.trim();
    match trimmed.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => &trimmed[PREFIX.len()..],
        _ => trimmed,
    }
}

/// Accepts clients presenting one of the configured tokens.
///
/// With no tokens configured every client is accepted.
#[derive(Debug, Clone, Default)]
pub struct TokenAuth {
    tokens: HashSet<String>,
}

impl TokenAuth {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn check(&self, token: Option<&str>) -> Result<(), String> {
        if self.is_open() {
            return Ok(());
        }
        let Some(token) = token else {
            return Err("missing authorization token".into());
        };
        if self.tokens.contains(strip_bearer(token)) {
            Ok(())
        } else {
            Err("invalid authorization token".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc123"), "abc123");
        assert_eq!(strip_bearer("BeArEr test"), "test");
        assert_eq!(strip_bearer("  bearer token  "), "token");
        assert_eq!(strip_bearer("abc123"), "abc123");
        assert_eq!(strip_bearer("bearer "), "bearer");
        assert_eq!(strip_bearer(""), "");
    }

    #[test]
    fn test_open_auth_accepts_anything() {
        let auth = TokenAuth::new(Vec::<String>::new());
        assert!(auth.is_open());
        assert!(auth.check(None).is_ok());
        assert!(auth.check(Some("whatever")).is_ok());
    }

    #[test]
    fn test_token_required() {
        let auth = TokenAuth::new(["secret", ""]);
        assert!(!auth.is_open());
        assert_eq!(
            auth.check(None),
            Err("missing authorization token".to_string())
        );
        assert_eq!(
            auth.check(Some("wrong")),
            Err("invalid authorization token".to_string())
        );
        assert!(auth.check(Some("secret")).is_ok());
        assert!(auth.check(Some("Bearer secret")).is_ok());
    }
}
