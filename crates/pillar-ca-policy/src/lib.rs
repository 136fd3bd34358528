use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod glob_targeting;

pub use glob_targeting::GlobPredicateEvaluator;

/// The identity asking for certificates.
///
/// `attributes` carries the facts a targeting expression can match against
/// (operating system, environment, roles published by the host, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterIdentity {
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RequesterIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Result of evaluating one targeting expression against one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateOutcome {
    Matched,
    NotMatched,
    /// The expression could not be evaluated; the string is a human readable reason.
    EvaluationFailed(String),
}

impl PredicateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::NotMatched => "not_matched",
            Self::EvaluationFailed(_) => "evaluation_failed",
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }
}

impl From<bool> for PredicateOutcome {
    fn from(value: bool) -> Self {
        if value {
            Self::Matched
        } else {
            Self::NotMatched
        }
    }
}

/// Targeting capability consumed by the distribution resolver.
pub trait PredicateEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, identity: &RequesterIdentity) -> PredicateOutcome;
}

impl<F> PredicateEvaluator for F
where
    F: Fn(&str, &RequesterIdentity) -> PredicateOutcome + Send + Sync,
{
    fn evaluate(&self, expression: &str, identity: &RequesterIdentity) -> PredicateOutcome {
        self(expression, identity)
    }
}
