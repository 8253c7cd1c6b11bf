//! Markup for classified output.

use std::fmt::Write as _;

use crate::domain::segment::{Segment, SegmentKind};

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// CSS class of the wrapper for `kind`; plain text is not wrapped.
pub fn wrapper_class(kind: SegmentKind) -> Option<&'static str> {
    match kind {
        SegmentKind::Marker => Some("markers"),
        SegmentKind::TokenMarker => Some("token-marker"),
        SegmentKind::Space => Some("space"),
        SegmentKind::Tab => Some("tab"),
        SegmentKind::Newline => Some("newline"),
        SegmentKind::Text => None,
    }
}

/// Render segments as HTML. Text is escaped first, then wrapped in a
/// `<span>` tagged with the segment's kind.
pub fn render_html(segments: &[Segment]) -> String {
    let mut html = String::new();
    for segment in segments {
        let text = escape_html(&segment.text);
        match wrapper_class(segment.kind) {
            Some(class) => {
                let _ = write!(html, r#"<span class="{class}">{text}</span>"#);
            }
            None => html.push_str(&text),
        }
    }
    html
}

/// One line per segment: kind, then the text in debug quoting so whitespace
/// stays visible.
pub fn render_listing(segments: &[Segment]) -> String {
    let mut listing = String::new();
    for segment in segments {
        let _ = writeln!(listing, "{:<12} {:?}", segment.kind.as_str(), segment.text);
    }
    listing
}
