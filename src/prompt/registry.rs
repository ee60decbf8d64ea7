use arc_swap::ArcSwap;
use std::sync::Arc;

use super::defaults;
use super::template::{PromptName, PromptTemplate, TemplateVars};
use crate::error::PromptError;

/// The complete set of active templates. One slot per [`PromptName`], so a
/// lookup can never miss.
#[derive(Debug, Clone)]
pub struct PromptSet {
    decision_agent: Arc<PromptTemplate>,
    text_generator: Arc<PromptTemplate>,
    quality_checker: Arc<PromptTemplate>,
}

impl PromptSet {
    fn builtin() -> Self {
        Self {
            decision_agent: Arc::new(PromptTemplate::new(
                PromptName::DecisionAgent,
                defaults::DECISION_AGENT,
            )),
            text_generator: Arc::new(PromptTemplate::new(
                PromptName::TextGenerator,
                defaults::TEXT_GENERATOR,
            )),
            quality_checker: Arc::new(PromptTemplate::new(
                PromptName::QualityChecker,
                defaults::QUALITY_CHECKER,
            )),
        }
    }

    #[must_use]
    pub fn get(&self, name: PromptName) -> Arc<PromptTemplate> {
        match name {
            PromptName::DecisionAgent => Arc::clone(&self.decision_agent),
            PromptName::TextGenerator => Arc::clone(&self.text_generator),
            PromptName::QualityChecker => Arc::clone(&self.quality_checker),
        }
    }

    fn replace(&mut self, template: PromptTemplate) {
        let slot = match template.name {
            PromptName::DecisionAgent => &mut self.decision_agent,
            PromptName::TextGenerator => &mut self.text_generator,
            PromptName::QualityChecker => &mut self.quality_checker,
        };
        *slot = Arc::new(template);
    }
}

/// Live-reloadable prompt store.
///
/// Wraps the active [`PromptSet`] in an `ArcSwap` so pipeline readers never
/// block and publishers atomically swap the snapshot. A stage keeps the
/// template `Arc` it grabbed for the whole call; a publish lands for the
/// next call, never mid-render.
pub struct PromptRegistry {
    inner: Arc<ArcSwap<PromptSet>>,
}

impl PromptRegistry {
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(PromptSet::builtin())),
        }
    }

    /// Current template under `name`. Lock-free.
    #[must_use]
    pub fn get(&self, name: PromptName) -> Arc<PromptTemplate> {
        self.inner.load().get(name)
    }

    /// Publish a new body under `name`, bumping its version by one. Readers
    /// holding the previous snapshot are unaffected; the next `get` sees the
    /// new template.
    pub fn publish(&self, name: PromptName, body: impl Into<String>) -> u32 {
        let body = body.into();
        let mut published = 0;
        self.inner.rcu(|current| {
            let version = current.get(name).version + 1;
            published = version;
            let mut next = PromptSet::clone(current);
            next.replace(PromptTemplate {
                name,
                version,
                body: body.clone(),
            });
            next
        });
        tracing::info!(template = %name, version = published, "prompt published");
        published
    }

    /// Render the current template under `name` with `vars`.
    pub fn render(&self, name: PromptName, vars: &TemplateVars) -> Result<String, PromptError> {
        self.get(name).render(vars)
    }
}

impl Clone for PromptRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
