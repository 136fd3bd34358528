use pillar_ca_policy::{PredicateEvaluator, PredicateOutcome, RequesterIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Targeting expression paired with the datacenter its members live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterRule {
    pub pattern: String,
    pub datacenter: String,
}

impl DatacenterRule {
    pub fn new(pattern: impl Into<String>, datacenter: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            datacenter: datacenter.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatacenterAssignment {
    pub dc: String,
}

impl DatacenterAssignment {
    pub fn to_pillar(&self) -> Value {
        json!({ "dc": self.dc })
    }
}

/// First-match datacenter lookup over ordered rules.
#[derive(Debug, Clone)]
pub struct DatacenterResolver<E> {
    evaluator: E,
    rules: Vec<DatacenterRule>,
}

impl<E: PredicateEvaluator> DatacenterResolver<E> {
    pub fn new(evaluator: E, rules: Vec<DatacenterRule>) -> Self {
        Self { evaluator, rules }
    }

    pub fn rules(&self) -> &[DatacenterRule] {
        &self.rules
    }

    pub fn resolve(&self, identity: &RequesterIdentity) -> Option<DatacenterAssignment> {
        self.rules.iter().find_map(|rule| {
            match self.evaluator.evaluate(&rule.pattern, identity) {
                PredicateOutcome::Matched => Some(DatacenterAssignment {
                    dc: rule.datacenter.clone(),
                }),
                PredicateOutcome::NotMatched => None,
                PredicateOutcome::EvaluationFailed(reason) => {
                    tracing::debug!(
                        requester = %identity.id,
                        pattern = %rule.pattern,
                        %reason,
                        "datacenter pattern failed to evaluate; skipping"
                    );
                    None
                }
            }
        })
    }
}
