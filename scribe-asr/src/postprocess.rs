//! Transcript text post-processing.
//!
//! Case repair runs on every hypothesis. Punctuation runs on committed text
//! only. Inverse text normalization happens inside the recognizer; this module
//! only decides which rule files it receives.

use crate::error::Result;
use crate::traits::Punctuator;
use std::path::PathBuf;

/// Lower-case shouting-case text and capitalize its first character.
///
/// Text with no alphabetic characters, or with any lower-case letter, is
/// returned unchanged.
pub fn repair_case(text: &str) -> String {
    let has_alpha = text.chars().any(char::is_alphabetic);
    if !has_alpha || text != text.to_uppercase() {
        return text.to_string();
    }

    let lower = text.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => lower,
    }
}

/// Keep the rule FSTs that exist on disk and join them for the recognizer.
///
/// Returns `None` (ITN disabled) when no path survives.
pub fn resolve_rule_fsts(paths: &[PathBuf]) -> Option<String> {
    let valid: Vec<&str> = paths
        .iter()
        .filter(|path| {
            let exists = path.is_file();
            if !exists {
                tracing::warn!(path = %path.display(), "skipping missing ITN rule file");
            }
            exists
        })
        .filter_map(|path| {
            let s = path.to_str();
            if s.is_none() {
                tracing::warn!(path = %path.display(), "skipping non UTF-8 ITN rule path");
            }
            s
        })
        .collect();

    if valid.is_empty() {
        if !paths.is_empty() {
            tracing::warn!("no usable ITN rule files, normalization disabled");
        }
        return None;
    }

    Some(valid.join(","))
}

/// Text clean-up applied before segments leave the pipeline.
#[derive(Default)]
pub struct TextPostProcessor {
    punctuator: Option<Box<dyn Punctuator>>,
}

impl TextPostProcessor {
    pub fn new(punctuator: Option<Box<dyn Punctuator>>) -> Self {
        Self { punctuator }
    }

    pub fn has_punctuation(&self) -> bool {
        self.punctuator.is_some()
    }

    /// Clean an in-progress hypothesis. Never punctuated.
    pub fn partial(&self, text: &str) -> String {
        repair_case(text.trim())
    }

    /// Clean committed text, restoring punctuation when a model is configured.
    pub fn finalize(&self, text: &str) -> Result<String> {
        let repaired = repair_case(text.trim());
        match &self.punctuator {
            Some(punctuator) if !repaired.is_empty() => {
                let punctuated = punctuator.add_punctuation(&repaired)?;
                Ok(punctuated.trim().to_string())
            }
            _ => Ok(repaired),
        }
    }
}

impl std::fmt::Debug for TextPostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPostProcessor")
            .field("punctuation", &self.has_punctuation())
            .finish()
    }
}
