//! Durable preference contract: which keys are persisted and how they rehydrate.

use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::domain::selection::{DEFAULT_TEST_CASE, RenderOption, RenderOptions, Selection};
use crate::domain::vocabulary::TokenVocabulary;

pub const CURRENT_FILE_KEY: &str = "currentFile";
pub const CURRENT_TEST_CASE_KEY: &str = "currentTestCase";
pub const ADD_GENERATION_PROMPT_KEY: &str = "addGenerationPrompt";
pub const ADD_SYSTEM_PROMPT_KEY: &str = "addSystemPrompt";
pub const TOKEN_VOCABULARY_KEY: &str = "tokenVocabulary";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read preferences from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("preferences file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("failed to write preferences to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode preferences: {0}")]
    Encode(String),
}

/// String key-value storage that survives restarts.
///
/// Writes are synchronous: once `set` returns `Ok`, the value is durable.
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

pub fn option_key(option: RenderOption) -> &'static str {
    match option {
        RenderOption::AddGenerationPrompt => ADD_GENERATION_PROMPT_KEY,
        RenderOption::AddSystemPrompt => ADD_SYSTEM_PROMPT_KEY,
    }
}

/// Typed access to the persisted selection and vocabulary.
///
/// Write failures are logged and swallowed; the in-memory session stays
/// authoritative for the running process.
pub struct Preferences {
    store: Box<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Box<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Selection as last persisted, with defaults for absent keys.
    pub fn load_selection(&self) -> Selection {
        let current_file = self
            .store
            .get(CURRENT_FILE_KEY)
            .filter(|path| !path.is_empty());
        let active_test_case = self
            .store
            .get(CURRENT_TEST_CASE_KEY)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_TEST_CASE.to_string());

        // Generation prompt is opt-out, system prompt is opt-in.
        let options = RenderOptions {
            add_generation_prompt: self
                .store
                .get(ADD_GENERATION_PROMPT_KEY)
                .is_none_or(|value| value != "false"),
            add_system_prompt: self
                .store
                .get(ADD_SYSTEM_PROMPT_KEY)
                .is_some_and(|value| value == "true"),
        };

        Selection {
            current_file,
            active_test_case,
            options,
        }
    }

    pub fn load_vocabulary(&self) -> TokenVocabulary {
        let Some(raw) = self.store.get(TOKEN_VOCABULARY_KEY) else {
            return TokenVocabulary::new();
        };

        match serde_json::from_str(&raw) {
            Ok(vocabulary) => vocabulary,
            Err(err) => {
                warn!(
                    target = "chatlens::preferences",
                    error = %err,
                    "ignoring unreadable persisted vocabulary"
                );
                TokenVocabulary::new()
            }
        }
    }

    pub fn save_current_file(&mut self, path: Option<&str>) {
        match path {
            Some(path) => self.write(CURRENT_FILE_KEY, path),
            None => {
                if let Err(err) = self.store.remove(CURRENT_FILE_KEY) {
                    log_write_failure(CURRENT_FILE_KEY, &err);
                }
            }
        }
    }

    pub fn save_test_case(&mut self, name: &str) {
        self.write(CURRENT_TEST_CASE_KEY, name);
    }

    pub fn save_option(&mut self, option: RenderOption, value: bool) {
        self.write(option_key(option), if value { "true" } else { "false" });
    }

    pub fn save_vocabulary(&mut self, vocabulary: &TokenVocabulary) {
        match serde_json::to_string(vocabulary) {
            Ok(encoded) => self.write(TOKEN_VOCABULARY_KEY, &encoded),
            Err(err) => {
                log_write_failure(TOKEN_VOCABULARY_KEY, &StoreError::Encode(err.to_string()))
            }
        }
    }

    fn write(&mut self, key: &'static str, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            log_write_failure(key, &err);
        }
    }
}

fn log_write_failure(key: &'static str, err: &StoreError) {
    warn!(
        target = "chatlens::preferences",
        key,
        error = %err,
        "failed to persist preference"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::MemoryStore;

    fn preferences(entries: &[(&str, &str)]) -> Preferences {
        let mut store = MemoryStore::default();
        for (key, value) in entries {
            store.set(key, value).expect("memory store never fails");
        }
        Preferences::new(Box::new(store))
    }

    #[test]
    fn first_run_uses_defaults() {
        let selection = preferences(&[]).load_selection();
        assert_eq!(selection, Selection::default());
    }

    #[test]
    fn option_parsing_is_asymmetric() {
        let selection = preferences(&[
            (ADD_GENERATION_PROMPT_KEY, "garbage"),
            (ADD_SYSTEM_PROMPT_KEY, "garbage"),
        ])
        .load_selection();
        assert!(selection.options.add_generation_prompt);
        assert!(!selection.options.add_system_prompt);

        let selection = preferences(&[
            (ADD_GENERATION_PROMPT_KEY, "false"),
            (ADD_SYSTEM_PROMPT_KEY, "true"),
        ])
        .load_selection();
        assert!(!selection.options.add_generation_prompt);
        assert!(selection.options.add_system_prompt);
    }

    #[test]
    fn saved_values_rehydrate() {
        let mut prefs = preferences(&[]);
        prefs.save_current_file(Some("gemma.jinja"));
        prefs.save_test_case("tools");
        prefs.save_option(RenderOption::AddSystemPrompt, true);
        prefs.save_vocabulary(&[("bos_token", "<bos>")].into_iter().collect());

        let selection = prefs.load_selection();
        assert_eq!(selection.current_file.as_deref(), Some("gemma.jinja"));
        assert_eq!(selection.active_test_case, "tools");
        assert!(selection.options.add_system_prompt);
        assert_eq!(prefs.load_vocabulary().get("bos_token"), Some("<bos>"));

        prefs.save_current_file(None);
        assert_eq!(prefs.load_selection().current_file, None);
    }

    #[test]
    fn corrupt_vocabulary_falls_back_to_empty() {
        let prefs = preferences(&[(TOKEN_VOCABULARY_KEY, "not json")]);
        assert!(prefs.load_vocabulary().is_empty());
    }
}
