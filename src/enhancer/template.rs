//! Text templating with `{{placeholder}}` substitution.
//!
//! Used to build the instruction sent to the language model from the raw
//! prompt and the customization attributes.
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    /// Parse `source`, rejecting unterminated or empty placeholders.
    pub fn new(source: impl Into<String>) -> AppResult<Self> {
        let template = PromptTemplate { source: source.into() };
        template.placeholders()?;
        Ok(template)
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> AppResult<Vec<&str>> {
        let mut names = Vec::new();
        let mut rest = self.source.as_str();
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| AppError::Template(format!("Unterminated placeholder near '{}'", &rest[start..])))?;
            let key = after[..end].trim();
            if key.is_empty() {
                return Err(AppError::Template("Empty placeholder".to_string()));
            }
            names.push(key);
            rest = &after[end + 2..];
        }
        Ok(names)
    }

    /// Replace every `{{ key }}` with `inputs[key]`.
    pub fn render(&self, inputs: &BTreeMap<&str, String>) -> AppResult<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| AppError::Template("Unterminated placeholder".to_string()))?;
            let key = after[..end].trim();
            let value = inputs
                .get(key)
                .ok_or_else(|| AppError::Template(format!("Missing input for placeholder: {}", key)))?;
            out.push_str(value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
