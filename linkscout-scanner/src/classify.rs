//! Anchor text classification.
//!
//! Rules are checked in table order and the first match wins.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    Image,
    NakedUrl,
    Empty,
    Generic,
    LongDescriptive,
    Short,
    Descriptive,
}

impl TextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextType::Image => "image",
            TextType::NakedUrl => "naked_url",
            TextType::Empty => "empty",
            TextType::Generic => "generic",
            TextType::LongDescriptive => "long_descriptive",
            TextType::Short => "short",
            TextType::Descriptive => "descriptive",
        }
    }
}

impl fmt::Display for TextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phrases that say nothing about the link target.
pub const GENERIC_PHRASES: &[&str] = &["click here", "read more", "learn more", "see more"];

#[derive(Debug, Clone, Copy)]
pub enum ClassificationRule {
    /// Text starts with the given marker.
    StartsWith(&'static str, TextType),
    /// Lowercased text contains any of the phrases.
    ContainsAny(&'static [&'static str], TextType),
    /// More than n whitespace-separated words.
    MoreWordsThan(usize, TextType),
    /// At most n whitespace-separated words.
    AtMostWords(usize, TextType),
}

impl ClassificationRule {
    pub fn apply(&self, text: &str) -> Option<TextType> {
        let (matched, label) = match *self {
            ClassificationRule::StartsWith(prefix, label) => (text.starts_with(prefix), label),
            ClassificationRule::ContainsAny(phrases, label) => {
                let lowered = text.to_lowercase();
                (phrases.iter().any(|p| lowered.contains(p)), label)
            }
            ClassificationRule::MoreWordsThan(n, label) => (word_count(text) > n, label),
            ClassificationRule::AtMostWords(n, label) => (word_count(text) <= n, label),
        };
        matched.then_some(label)
    }
}

/// First match wins; anything left over is `Descriptive`.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule::StartsWith("[Image", TextType::Image),
    ClassificationRule::StartsWith("[Naked URL", TextType::NakedUrl),
    ClassificationRule::StartsWith("[Empty", TextType::Empty),
    ClassificationRule::ContainsAny(GENERIC_PHRASES, TextType::Generic),
    ClassificationRule::MoreWordsThan(8, TextType::LongDescriptive),
    ClassificationRule::AtMostWords(2, TextType::Short),
];

pub fn classify(text: &str) -> TextType {
    classify_with(CLASSIFICATION_RULES, text)
}

pub fn classify_with(rules: &[ClassificationRule], text: &str) -> TextType {
    rules
        .iter()
        .find_map(|rule| rule.apply(text))
        .unwrap_or(TextType::Descriptive)
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
