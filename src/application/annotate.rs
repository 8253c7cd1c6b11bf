//! Output annotation: classify rendered template text into typed segments.
//!
//! Classification is a greedy scan. At every position the rules below are tried
//! in a fixed order and the first one that matches wins:
//!
//! 1. a literal from the special-token vocabulary (longest literal first),
//! 2. an angle-bracket run `<...>`,
//! 3. a square-bracket run `[...]`,
//! 4. a run of `#` characters,
//! 5. any additional marker patterns registered on the [`Classifier`],
//! 6. a single space, tab, or newline,
//! 7. any single character as text.
//!
//! The last rule always matches, so classification is total and the produced
//! segments concatenate back to the input.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::domain::segment::{Segment, SegmentKind};
use crate::domain::vocabulary::TokenVocabulary;

static ANGLE_RUN: Lazy<Regex> = Lazy::new(|| builtin(r"<[^>]*>"));
static SQUARE_RUN: Lazy<Regex> = Lazy::new(|| builtin(r"\[[^\]]*\]"));
static HEADING_RUN: Lazy<Regex> = Lazy::new(|| builtin(r"#+"));

fn builtin(pattern: &str) -> Regex {
    Regex::new(&anchor(pattern)).expect("built-in marker pattern must compile")
}

fn anchor(pattern: &str) -> String {
    format!("^(?:{pattern})")
}

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("failed to compile token pattern for {count} literals: {source}")]
    TokenPattern {
        count: usize,
        #[source]
        source: regex::Error,
    },
    #[error("invalid marker pattern `{pattern}`: {source}")]
    MarkerPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compiled rule set for one vocabulary.
///
/// Build once per vocabulary change and reuse for every render result.
#[derive(Debug, Clone)]
pub struct Classifier {
    tokens: Option<Regex>,
    extra_markers: Vec<Regex>,
}

impl Classifier {
    pub fn new(vocabulary: &TokenVocabulary) -> Result<Self, AnnotateError> {
        Ok(Self {
            tokens: token_pattern(vocabulary)?,
            extra_markers: Vec::new(),
        })
    }

    /// Classifier without any token rule.
    pub fn structural() -> Self {
        Self {
            tokens: None,
            extra_markers: Vec::new(),
        }
    }

    /// Register an extra marker rule, tried after the built-in structural rules.
    pub fn with_marker_pattern(mut self, pattern: &str) -> Result<Self, AnnotateError> {
        let regex =
            Regex::new(&anchor(pattern)).map_err(|source| AnnotateError::MarkerPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        self.extra_markers.push(regex);
        Ok(self)
    }

    pub fn classify(&self, content: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut rest = content;

        while !rest.is_empty() {
            let (kind, len) = self.match_at(rest);
            let (head, tail) = rest.split_at(len);
            segments.push(Segment::new(kind, head));
            rest = tail;
        }

        segments
    }

    fn match_at(&self, rest: &str) -> (SegmentKind, usize) {
        if let Some(len) = self.tokens.as_ref().and_then(|tokens| match_len(tokens, rest)) {
            return (SegmentKind::TokenMarker, len);
        }

        let structural = [&*ANGLE_RUN, &*SQUARE_RUN, &*HEADING_RUN];
        for rule in structural.into_iter().chain(self.extra_markers.iter()) {
            if let Some(len) = match_len(rule, rest) {
                return (SegmentKind::Marker, len);
            }
        }

        match rest.chars().next() {
            Some(' ') => (SegmentKind::Space, 1),
            Some('\t') => (SegmentKind::Tab, 1),
            Some('\n') => (SegmentKind::Newline, 1),
            Some(other) => (SegmentKind::Text, other.len_utf8()),
            None => (SegmentKind::Text, rest.len()),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::structural()
    }
}

/// Classify `content` against `vocabulary`. Never fails: if the token rule
/// cannot be compiled the text is classified with the structural rules only.
pub fn classify(content: &str, vocabulary: &TokenVocabulary) -> Vec<Segment> {
    match Classifier::new(vocabulary) {
        Ok(classifier) => classifier.classify(content),
        Err(err) => {
            warn!(
                target = "chatlens::annotate",
                error = %err,
                "token rule unavailable, classifying without vocabulary"
            );
            Classifier::structural().classify(content)
        }
    }
}

/// Single alternation over every escaped literal, longest first, so the
/// regex engine's first-alternative preference yields the longest literal.
fn token_pattern(vocabulary: &TokenVocabulary) -> Result<Option<Regex>, AnnotateError> {
    let literals = vocabulary.literals_longest_first();
    if literals.is_empty() {
        return Ok(None);
    }

    let alternation = literals
        .iter()
        .map(|literal| regex::escape(literal))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&anchor(&alternation))
        .map(Some)
        .map_err(|source| AnnotateError::TokenPattern {
            count: literals.len(),
            source,
        })
}

fn match_len(rule: &Regex, rest: &str) -> Option<usize> {
    rule.find(rest)
        .map(|found| found.end())
        .filter(|&end| end > 0)
}
