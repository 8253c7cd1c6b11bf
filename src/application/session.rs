//! Render session state: the selection, the remote lists, and the last result.
//!
//! All mutation goes through the named mutators below. Mutators that change
//! the selection hand back the request to issue (if a file is open) instead of
//! dispatching it themselves; the caller owns the pipeline.

use chatlens_api_types::RenderRequest;
use tracing::warn;

use crate::application::annotate::Classifier;
use crate::domain::segment::{RenderResult, Segment};
use crate::domain::selection::{DEFAULT_TEST_CASE, RenderOption, Selection};
use crate::domain::vocabulary::TokenVocabulary;

/// Which screen the client is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    FileList,
    Template,
}

/// Result of replacing the file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileListOutcome {
    Unchanged,
    /// The open file disappeared; the session went back to the file list.
    Evicted,
}

#[derive(Debug, Clone)]
pub struct RenderSession {
    selection: Selection,
    screen: Screen,
    vocabulary: TokenVocabulary,
    classifier: Classifier,
    files: Vec<String>,
    test_cases: Vec<String>,
    last_result: Option<RenderResult>,
}

impl RenderSession {
    /// Rebuild a session from persisted state.
    pub fn restore(selection: Selection, vocabulary: TokenVocabulary) -> Self {
        let screen = if selection.current_file.is_some() {
            Screen::Template
        } else {
            Screen::FileList
        };
        let classifier = build_classifier(&vocabulary);

        Self {
            selection,
            screen,
            vocabulary,
            classifier,
            files: Vec::new(),
            test_cases: Vec::new(),
            last_result: None,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn current_file(&self) -> Option<&str> {
        self.selection.current_file.as_deref()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn vocabulary(&self) -> &TokenVocabulary {
        &self.vocabulary
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn test_cases(&self) -> &[String] {
        &self.test_cases
    }

    pub fn last_result(&self) -> Option<&RenderResult> {
        self.last_result.as_ref()
    }

    /// Request for the current selection, `None` while no file is open.
    pub fn render_request(&self) -> Option<RenderRequest> {
        self.selection.to_request()
    }

    /// Segments of the last successful render, classified with the current
    /// vocabulary. `None` when there is no result or the last render failed.
    pub fn annotated_output(&self) -> Option<Vec<Segment>> {
        match self.last_result.as_ref()? {
            RenderResult::Success { content } => Some(self.classifier.classify(content)),
            RenderResult::Failure { .. } => None,
        }
    }

    pub fn select_file(&mut self, path: impl Into<String>) -> Option<RenderRequest> {
        self.selection.current_file = Some(path.into());
        self.screen = Screen::Template;
        self.render_request()
    }

    pub fn select_test_case(&mut self, name: impl Into<String>) -> Option<RenderRequest> {
        self.selection.active_test_case = name.into();
        self.render_request()
    }

    pub fn set_option(&mut self, option: RenderOption, value: bool) -> Option<RenderRequest> {
        self.selection.options.set(option, value);
        self.render_request()
    }

    pub fn navigate_to_file_list(&mut self) {
        self.screen = Screen::FileList;
    }

    pub fn replace_vocabulary(&mut self, vocabulary: TokenVocabulary) {
        self.classifier = build_classifier(&vocabulary);
        self.vocabulary = vocabulary;
    }

    /// Replace the known files. If the open file is gone, it is closed and the
    /// session returns to the file list.
    pub fn replace_file_list(&mut self, files: Vec<String>) -> FileListOutcome {
        self.files = files;

        let evicted = self
            .selection
            .current_file
            .as_ref()
            .is_some_and(|current| !self.files.contains(current));
        if !evicted {
            return FileListOutcome::Unchanged;
        }

        self.selection.current_file = None;
        self.last_result = None;
        self.screen = Screen::FileList;
        FileListOutcome::Evicted
    }

    /// Replace the known test cases and revalidate the active one. Returns the
    /// new active case when it had to change.
    pub fn replace_test_case_list(&mut self, test_cases: Vec<String>) -> Option<String> {
        self.test_cases = test_cases;

        if self.test_cases.contains(&self.selection.active_test_case) {
            return None;
        }

        let fallback = self
            .test_cases
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_TEST_CASE.to_string());
        if fallback == self.selection.active_test_case {
            return None;
        }
        self.selection.active_test_case = fallback.clone();
        Some(fallback)
    }

    pub fn apply_result(&mut self, result: RenderResult) {
        self.last_result = Some(result);
    }
}

impl Default for RenderSession {
    fn default() -> Self {
        Self::restore(Selection::default(), TokenVocabulary::new())
    }
}

fn build_classifier(vocabulary: &TokenVocabulary) -> Classifier {
    Classifier::new(vocabulary).unwrap_or_else(|err| {
        warn!(
            target = "chatlens::session",
            error = %err,
            tokens = vocabulary.len(),
            "token rule unavailable, annotating without vocabulary"
        );
        Classifier::structural()
    })
}
