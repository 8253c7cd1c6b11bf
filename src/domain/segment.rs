//! Classified spans of rendered output and render outcomes.

use std::fmt;

/// Display kind of a [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Structural markup such as `<tag>`, `[INST]`, or `###`.
    Marker,
    /// A literal from the special-token vocabulary.
    TokenMarker,
    Space,
    Tab,
    Newline,
    /// Anything else, one character at a time.
    Text,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Marker => "marker",
            SegmentKind::TokenMarker => "token-marker",
            SegmentKind::Space => "space",
            SegmentKind::Tab => "tab",
            SegmentKind::Newline => "newline",
            SegmentKind::Text => "text",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contiguous span of the raw rendered text with its display kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    pub fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Concatenate the raw text of a segment sequence.
pub fn raw_text(segments: &[Segment]) -> String {
    segments.iter().map(|segment| segment.text.as_str()).collect()
}

/// Outcome of a single render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    Success { content: String },
    Failure { error: String },
}

impl RenderResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, RenderResult::Failure { .. })
    }
}

impl From<chatlens_api_types::RenderUpdate> for RenderResult {
    fn from(update: chatlens_api_types::RenderUpdate) -> Self {
        match update.into_result() {
            Ok(content) => RenderResult::Success { content },
            Err(error) => RenderResult::Failure { error },
        }
    }
}
