//! Plain-text frames of the session for the terminal.

use std::fmt::Write as _;
use std::io::Write;

use clap::ValueEnum;
use tracing::warn;

use crate::application::debugger::SessionView;
use crate::application::session::{RenderSession, Screen};
use crate::domain::segment::{RenderResult, Segment, raw_text};
use crate::domain::selection::Selection;
use crate::presentation::markup;

/// How annotated output is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Escaped HTML with kind-tagged spans.
    #[default]
    Html,
    /// The rendered text unchanged.
    Raw,
    /// One classified segment per line.
    Segments,
}

pub fn format_segments(segments: &[Segment], format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => markup::render_html(segments),
        OutputFormat::Raw => raw_text(segments),
        OutputFormat::Segments => markup::render_listing(segments),
    }
}

/// Full text of the current screen.
pub fn frame(session: &RenderSession, format: OutputFormat) -> String {
    let mut out = String::new();
    match session.screen() {
        Screen::FileList => {
            let _ = writeln!(out, "templates ({}):", session.files().len());
            for file in session.files() {
                let marker = if session.current_file() == Some(file.as_str()) {
                    '*'
                } else {
                    ' '
                };
                let _ = writeln!(out, " {marker} {file}");
            }
        }
        Screen::Template => {
            let _ = writeln!(out, "{}", header(session.selection()));
            match session.last_result() {
                None => out.push_str("(rendering)\n"),
                Some(RenderResult::Failure { error }) => {
                    let _ = writeln!(out, "error: {error}");
                }
                Some(RenderResult::Success { .. }) => {
                    let segments = session.annotated_output().unwrap_or_default();
                    out.push_str(&format_segments(&segments, format));
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
    }
    out
}

fn header(selection: &Selection) -> String {
    let on_off = |value: bool| if value { "on" } else { "off" };
    format!(
        "== {} [{}] generation-prompt={} system-prompt={} ==",
        selection.current_file.as_deref().unwrap_or("-"),
        selection.active_test_case,
        on_off(selection.options.add_generation_prompt),
        on_off(selection.options.add_system_prompt),
    )
}

/// Prints a frame whenever it differs from the previous one.
pub struct TerminalView<W: Write> {
    out: W,
    format: OutputFormat,
    last_frame: Option<String>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            last_frame: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SessionView for TerminalView<W> {
    fn refresh(&mut self, session: &RenderSession) {
        let frame = frame(session, self.format);
        if self.last_frame.as_ref() == Some(&frame) {
            return;
        }

        let written = self
            .out
            .write_all(frame.as_bytes())
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        if let Err(err) = written {
            warn!(target = "chatlens::terminal", error = %err, "failed to write frame");
        }
        self.last_frame = Some(frame);
    }
}
