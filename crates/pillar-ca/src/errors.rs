use pillar_ca_store::CaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("invalid distribution request: {0}")]
    InvalidRequest(String),
    #[error("targeting predicate for role '{role}' failed: {reason}")]
    PredicateFailed { role: String, reason: String },
    #[error("certificate authority operation failed: {0}")]
    Ca(#[from] CaError),
}

impl DistributionError {
    /// Stable failure code; store errors report their own kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PredicateFailed { .. } => "predicate_failed",
            Self::Ca(error) => error.kind().as_str(),
        }
    }
}
