mod defaults;
mod registry;
mod template;

pub use registry::{PromptRegistry, PromptSet};
pub use template::{PromptName, PromptTemplate, TemplateVars};
