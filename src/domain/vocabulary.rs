//! Special-token vocabulary supplied by the render service.

use std::collections::BTreeMap;

use chatlens_api_types::TokenMap;
use serde::{Deserialize, Serialize};

/// Token name → literal text.
///
/// Literal values are opaque data: they may contain characters that are
/// meaningful to a pattern language and must never be interpreted as a pattern.
/// The vocabulary is only ever replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenVocabulary(BTreeMap<String, String>);

impl TokenVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, literal)| (name.as_str(), literal.as_str()))
    }

    /// Name of the token whose literal is exactly `text`, if any.
    pub fn name_of(&self, text: &str) -> Option<&str> {
        self.iter()
            .find(|(_, literal)| *literal == text)
            .map(|(name, _)| name)
    }

    /// Distinct non-empty literals, longest first (ties broken lexically).
    pub fn literals_longest_first(&self) -> Vec<&str> {
        let mut literals: Vec<&str> = self
            .0
            .values()
            .map(String::as_str)
            .filter(|literal| !literal.is_empty())
            .collect();
        literals.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        literals.dedup();
        literals
    }
}

impl From<TokenMap> for TokenVocabulary {
    fn from(map: TokenMap) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for TokenVocabulary
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, literal)| (name.into(), literal.into()))
                .collect(),
        )
    }
}
