//! The user's current choice of template, test case, and render options.

use chatlens_api_types::RenderRequest;

/// Test case used when nothing valid has been chosen yet.
pub const DEFAULT_TEST_CASE: &str = "basic";

/// Toggles forwarded to the template renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub add_generation_prompt: bool,
    pub add_system_prompt: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            add_generation_prompt: true,
            add_system_prompt: false,
        }
    }
}

impl RenderOptions {
    pub fn get(&self, option: RenderOption) -> bool {
        match option {
            RenderOption::AddGenerationPrompt => self.add_generation_prompt,
            RenderOption::AddSystemPrompt => self.add_system_prompt,
        }
    }

    pub fn set(&mut self, option: RenderOption, value: bool) {
        match option {
            RenderOption::AddGenerationPrompt => self.add_generation_prompt = value,
            RenderOption::AddSystemPrompt => self.add_system_prompt = value,
        }
    }
}

/// Individually toggleable render option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderOption {
    AddGenerationPrompt,
    AddSystemPrompt,
}

impl RenderOption {
    pub const ALL: [RenderOption; 2] = [
        RenderOption::AddGenerationPrompt,
        RenderOption::AddSystemPrompt,
    ];
}

/// Everything that determines a render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub current_file: Option<String>,
    pub active_test_case: String,
    pub options: RenderOptions,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            current_file: None,
            active_test_case: DEFAULT_TEST_CASE.to_string(),
            options: RenderOptions::default(),
        }
    }
}

impl Selection {
    /// Request body for the current selection; `None` while no file is open.
    pub fn to_request(&self) -> Option<RenderRequest> {
        let filepath = self.current_file.clone()?;
        Some(RenderRequest {
            filepath,
            test_case: self.active_test_case.clone(),
            add_generation_prompt: self.options.add_generation_prompt,
            add_system_prompt: self.options.add_system_prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_generation_prompt_only() {
        let options = RenderOptions::default();
        assert!(options.get(RenderOption::AddGenerationPrompt));
        assert!(!options.get(RenderOption::AddSystemPrompt));
    }

    #[test]
    fn no_request_without_file() {
        assert_eq!(Selection::default().to_request(), None);
    }

    #[test]
    fn request_mirrors_selection() {
        let mut selection = Selection {
            current_file: Some("mistral.jinja".into()),
            active_test_case: "tools".into(),
            ..Selection::default()
        };
        selection.options.set(RenderOption::AddSystemPrompt, true);

        let request = selection.to_request().expect("file is selected");
        assert_eq!(request.filepath, "mistral.jinja");
        assert_eq!(request.test_case, "tools");
        assert!(request.add_generation_prompt);
        assert!(request.add_system_prompt);
    }
}
