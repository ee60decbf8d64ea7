use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tera::Tera;

use crate::error::PromptError;

// PromptName — the three slots the pipeline renders from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PromptName {
    DecisionAgent,
    TextGenerator,
    QualityChecker,
}

/// One versioned prompt template. Bodies are tera strings; rendering is
/// strict, so an unfilled placeholder is an error rather than silent empty
/// text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: PromptName,
    pub version: u32,
    pub body: String,
}

impl PromptTemplate {
    #[must_use]
    pub fn new(name: PromptName, body: impl Into<String>) -> Self {
        Self {
            name,
            version: 1,
            body: body.into(),
        }
    }

    /// Render the body with `vars`. Same template, same values, same output.
    pub fn render(&self, vars: &TemplateVars) -> Result<String, PromptError> {
        Tera::one_off(&self.body, &vars.context, false).map_err(|err| self.classify(&err))
    }

    fn classify(&self, err: &tera::Error) -> PromptError {
        let message = error_chain(err);
        match missing_variable(&message) {
            Some(placeholder) => PromptError::MissingPlaceholder {
                template: self.name.to_string(),
                placeholder,
            },
            None => PromptError::Render {
                template: self.name.to_string(),
                message,
            },
        }
    }
}

/// Values available to a template. Thin wrapper so call sites never touch
/// tera types directly.
pub struct TemplateVars {
    context: tera::Context,
}

impl TemplateVars {
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: tera::Context::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Serialize) {
        self.context.insert(key, &value);
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        self.set(key, value);
        self
    }
}

impl Default for TemplateVars {
    fn default() -> Self {
        Self::new()
    }
}

fn error_chain(err: &tera::Error) -> String {
    use std::error::Error as _;

    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

// Tera reports an unfilled placeholder as "Variable `name` not found in
// context"; anything else stays a generic render fault.
fn missing_variable(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("Variable `")?;
    let (name, tail) = rest.split_once('`')?;
    tail.contains("not found").then(|| name.to_string())
}
