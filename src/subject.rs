//! Subject algebra: hierarchical path tokens and wildcard matching.
//!
//! Every stream and event in the store is addressed by an ordered path of
//! text tokens (e.g. `user.42.added`). Query patterns may replace tokens
//! with wildcards:
//!
//! - [`Subject::Any`] (`*`) matches exactly one arbitrary token
//! - [`Subject::All`] (`#`) matches all remaining tokens, including none,
//!   and is only valid as the last pattern element
//!
//! [`matches`] is the single source of truth for pattern semantics. The
//! trie descent of the memory backend and the SQL compilation of the
//! Postgres backend must agree with it on every edge case.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Characters that are reserved for wildcards and therefore forbidden
/// inside a literal token.
const WILDCARD_CHARS: &[char] = &['*', '>', '#'];

// ═══════════════════════════════════════════════════════════════════════════════
// Text Subjects
// ═══════════════════════════════════════════════════════════════════════════════

/// A single literal token of a hierarchical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextSubject(String);

impl TextSubject {
    /// Create a validated token. Rejects empty tokens and tokens
    /// containing wildcard characters.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::InvalidSubjects("empty token".to_string()));
        }
        if token.contains(WILDCARD_CHARS) {
            return Err(Error::InvalidSubjects(format!(
                "token {token:?} contains a wildcard character"
            )));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for TextSubject {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// An ordered sequence of literal tokens: a concrete path.
///
/// Used both as aggregate IDs and as event action paths. Order is
/// significant and never reordered; equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSubjects(Vec<TextSubject>);

impl TextSubjects {
    /// Build a path from string tokens, validating each one.
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens
            .into_iter()
            .map(TextSubject::new)
            .collect::<Result<Vec<_>>>()?;
        if tokens.is_empty() {
            return Err(Error::InvalidSubjects("empty path".to_string()));
        }
        Ok(Self(tokens))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TextSubject> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TextSubject> {
        self.0.iter()
    }

    /// Join the tokens with a separator. Used for display and map keys.
    pub fn join(&self, sep: &str) -> String {
        self.0
            .iter()
            .map(TextSubject::as_str)
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// The tokens as plain strings, in path order.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().map(|t| t.0.clone()).collect()
    }
}

impl fmt::Display for TextSubjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("."))
    }
}

impl TryFrom<Vec<String>> for TextSubjects {
    type Error = Error;

    fn try_from(tokens: Vec<String>) -> Result<Self> {
        Self::new(tokens)
    }
}

impl<'a> IntoIterator for &'a TextSubjects {
    type Item = &'a TextSubject;
    type IntoIter = std::slice::Iter<'a, TextSubject>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Patterns
// ═══════════════════════════════════════════════════════════════════════════════

/// One element of a query pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// A literal token that must match exactly (case-sensitive).
    Text(TextSubject),
    /// Single-token wildcard (`*`): matches exactly one arbitrary token.
    Any,
    /// Multi-token wildcard (`#`): matches the remainder of the path,
    /// including zero tokens. Only valid as the last pattern element.
    All,
}

impl Subject {
    /// Shorthand for a validated literal pattern element.
    pub fn text(token: impl Into<String>) -> Result<Self> {
        Ok(Self::Text(TextSubject::new(token)?))
    }
}

impl From<TextSubject> for Subject {
    fn from(token: TextSubject) -> Self {
        Self::Text(token)
    }
}

/// Reject structurally invalid patterns before any matching or I/O.
///
/// A pattern must be non-empty and may carry [`Subject::All`] only in the
/// last position. Literal tokens are validated at construction.
pub fn validate_pattern(pattern: &[Subject]) -> Result<()> {
    if pattern.is_empty() {
        return Err(Error::InvalidSubjects("empty pattern".to_string()));
    }
    for (i, subject) in pattern.iter().enumerate() {
        if matches!(subject, Subject::All) && i + 1 != pattern.len() {
            return Err(Error::InvalidSubjects(
                "multi-token wildcard must be the last pattern element".to_string(),
            ));
        }
    }
    Ok(())
}

/// Whether `candidate` matches `pattern`, position by position.
///
/// Cardinality: a pattern without a trailing [`Subject::All`] requires the
/// candidate to have exactly as many tokens as the pattern; with one it
/// requires at least `pattern.len() - 1` tokens. The empty pattern matches
/// nothing.
pub fn matches(pattern: &[Subject], candidate: &TextSubjects) -> bool {
    if pattern.is_empty() {
        return false;
    }

    for (i, subject) in pattern.iter().enumerate() {
        match subject {
            Subject::All => return candidate.len() >= pattern.len() - 1,
            Subject::Any => {
                if i >= candidate.len() {
                    return false;
                }
            }
            Subject::Text(token) => match candidate.get(i) {
                Some(c) if c == token => {}
                _ => return false,
            },
        }
    }

    candidate.len() == pattern.len()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
