use thiserror::Error;

/// Failures that abort plan generation.
///
/// A slot with no qualifying food is not an error; it surfaces as
/// `empty_options` on that slot of the assembled plan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("food catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("meal plan incomplete: {0}")]
    IncompletePlan(String),

    #[error("meal plan generation timed out after {0} ms")]
    Timeout(u64),

    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidProfile(msg.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidProfile(_))
    }
}
