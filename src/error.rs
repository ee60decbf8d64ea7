use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `nudge`.
///
/// Each subsystem defines its own error enum. Library callers can match on
/// these to decide recovery strategy; the binary boundary uses
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum NudgeError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Completion service ──────────────────────────────────────────────
    #[error("completion: {0}")]
    Completion(#[from] CompletionError),

    // ── Prompt / Template ───────────────────────────────────────────────
    #[error("prompt: {0}")]
    Prompt(#[from] PromptError),

    // ── Pipeline stages ─────────────────────────────────────────────────
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    // ── Storage collaborators ───────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Growth analysis ─────────────────────────────────────────────────
    #[error("insight: {0}")]
    Insight(#[from] InsightError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Completion service errors ──────────────────────────────────────────────

/// Faults raised by the completion service boundary.
///
/// Only [`RateLimited`](CompletionError::RateLimited) and
/// [`Timeout`](CompletionError::Timeout) are worth retrying; the other two
/// mean the upstream answered and retrying the identical request would not
/// change the reply.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion service rate limited")]
    RateLimited {
        /// Server-suggested pause, when the 429 carried a `Retry-After`.
        retry_after_secs: Option<u64>,
    },

    #[error("completion request timed out")]
    Timeout,

    #[error("completion service fault: {0}")]
    Upstream(String),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Whether a retry with backoff has any chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout)
    }
}

// ─── Prompt / Template errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template `{template}` references `{placeholder}` but no value was supplied")]
    MissingPlaceholder { template: String, placeholder: String },

    #[error("template `{template}` failed to render: {message}")]
    Render { template: String, message: String },
}

// ─── Pipeline stage errors ──────────────────────────────────────────────────

/// Faults that abort a pipeline run. The orchestrator folds these into an
/// `error` outcome rather than letting them escape to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("decision reply did not match the expected schema: {0}")]
    DecisionParse(String),

    #[error("quality verdict did not match the expected schema: {0}")]
    QualityParse(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("user context unavailable: {0}")]
    Context(#[from] StoreError),
}

// ─── Store errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

// ─── Growth analysis errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InsightError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("growth reply did not match the expected schema: {0}")]
    Parse(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, NudgeError>;
