//! Regex capability used by the `=~` operator.
//!
//! A [`Pattern`] is compiled from a pattern body plus a flag string, the two
//! halves of a `/pattern/flags` literal.  Matching returns [`Captures`] whose
//! group 0 is the whole match.
//!
//! ## Flags
//!
//! | Flag | Effect |
//! |------|--------|
//! | `i`  | case-insensitive |
//! | `m`  | `^`/`$` match at line boundaries |
//! | `s`  | `.` matches newlines |
//! | `x`  | ignore whitespace and `#` comments in the pattern |
//! | `u`  | Unicode classes (already the default) |
//! | `U`  | swap greedy and lazy quantifiers |

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Error returned when a pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    #[error("{0}")]
    InvalidRegex(String),
    #[error("unknown flag '{0}'")]
    UnknownFlag(char),
    #[error("'{0}' is not a /pattern/flags literal")]
    NotDelimited(String),
}

/// A compiled pattern ready for matching.
#[derive(Clone)]
pub struct Pattern {
    src: String,
    flags: String,
    regex: Arc<Regex>,
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("src", &self.src)
            .field("flags", &self.flags)
            .finish()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.src, self.flags)
    }
}

impl Pattern {
    /// Compile `src` with the given flag letters.
    pub fn new(src: &str, flags: &str) -> Result<Self, PatternError> {
        let mut builder = RegexBuilder::new(src);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'u' => builder.unicode(true),
                'U' => builder.swap_greed(true),
                other => return Err(PatternError::UnknownFlag(other)),
            };
        }
        let regex = builder
            .build()
            .map_err(|e| PatternError::InvalidRegex(e.to_string()))?;
        Ok(Self {
            src: src.to_owned(),
            flags: flags.to_owned(),
            regex: Arc::new(regex),
        })
    }

    /// Compile a delimited `/pattern/flags` string.
    ///
    /// The body ends at the last `/`; everything after it is flags.
    pub fn parse_delimited(text: &str) -> Result<Self, PatternError> {
        let not_delimited = || PatternError::NotDelimited(text.to_owned());
        let rest = text.strip_prefix('/').ok_or_else(not_delimited)?;
        let end = rest.rfind('/').ok_or_else(not_delimited)?;
        Self::new(&rest[..end], &rest[end + 1..])
    }

    /// Attempt a match and return [`Captures`] on success.
    pub fn find<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        let caps = self.regex.captures(text)?;
        let groups = caps
            .iter()
            .map(|m| m.map(|m| m.as_str()))
            .collect();
        Some(Captures { groups })
    }
}

/// The result of a successful match.
pub struct Captures<'t> {
    /// Group 0 is the whole match; `None` = group didn't participate.
    groups: Vec<Option<&'t str>>,
}

impl<'t> Captures<'t> {
    /// Every group in order; non-participating groups yield `""`.
    pub fn texts(&self) -> impl Iterator<Item = &'t str> + '_ {
        self.groups.iter().map(|g| g.unwrap_or(""))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
