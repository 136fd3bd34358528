use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use pillar_ca_policy::RequesterIdentity;
use pillar_ca_store::{validate_artifact_name, CaError, CaKeyPresence, CertificateOptions};
use serde::{Deserialize, Serialize};

use crate::DistributionError;

pub const DEFAULT_BASE_PATH: &str = "/etc/ssl";
pub const DEFAULT_CA_NAME: &str = "PSFCA";

/// What to do when a role's targeting expression cannot be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateFailurePolicy {
    /// Log at warn and treat the role as not matched.
    #[default]
    TreatAsNoMatch,
    /// Fail the whole request with [`DistributionError::PredicateFailed`].
    Abort,
}

impl PredicateFailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TreatAsNoMatch => "treat_as_no_match",
            Self::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSettings {
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    #[serde(default = "default_ca_name")]
    pub ca_name: String,
    pub ca_options: CertificateOptions,
    #[serde(default)]
    pub predicate_failure: PredicateFailurePolicy,
    #[serde(default)]
    pub ca_key_presence: CaKeyPresence,
}

fn default_base_path() -> PathBuf {
    PathBuf::from(DEFAULT_BASE_PATH)
}

fn default_ca_name() -> String {
    DEFAULT_CA_NAME.to_string()
}

impl DistributionSettings {
    pub fn new(ca_options: CertificateOptions) -> Self {
        Self {
            base_path: default_base_path(),
            ca_name: default_ca_name(),
            ca_options,
            predicate_failure: PredicateFailurePolicy::default(),
            ca_key_presence: CaKeyPresence::default(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_ca_name(mut self, ca_name: impl Into<String>) -> Self {
        self.ca_name = ca_name.into();
        self
    }

    pub fn with_predicate_failure(mut self, policy: PredicateFailurePolicy) -> Self {
        self.predicate_failure = policy;
        self
    }

    pub fn with_ca_key_presence(mut self, presence: CaKeyPresence) -> Self {
        self.ca_key_presence = presence;
        self
    }

    pub fn validate(&self) -> Result<(), DistributionError> {
        if self.base_path.as_os_str().is_empty() {
            return Err(
                CaError::InvalidConfiguration("base_path must not be empty".to_string()).into(),
            );
        }
        validate_artifact_name("ca_name", &self.ca_name)?;
        self.ca_options.validate()?;
        Ok(())
    }
}

/// One requester asking for the certificates its roles entitle it to.
///
/// `role_assignments` maps a role to the targeting expression selecting its
/// members; `role_certificates` maps a role to the common names it owes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub requester: RequesterIdentity,
    #[serde(default)]
    pub role_assignments: BTreeMap<String, String>,
    #[serde(default)]
    pub role_certificates: BTreeMap<String, BTreeSet<String>>,
}

impl DistributionRequest {
    pub fn new(requester: RequesterIdentity) -> Self {
        Self {
            requester,
            ..Self::default()
        }
    }

    pub fn with_role(
        mut self,
        role: impl Into<String>,
        expression: impl Into<String>,
        certificates: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let role = role.into();
        self.role_assignments.insert(role.clone(), expression.into());
        self.role_certificates
            .entry(role)
            .or_default()
            .extend(certificates.into_iter().map(Into::into));
        self
    }

    pub fn validate(&self) -> Result<(), DistributionError> {
        if self.requester.id.trim().is_empty() {
            return Err(DistributionError::InvalidRequest(
                "requester.id must not be empty".to_string(),
            ));
        }
        for (role, certificates) in &self.role_certificates {
            if role.trim().is_empty() {
                return Err(DistributionError::InvalidRequest(
                    "role_certificates contains an empty role name".to_string(),
                ));
            }
            for common_name in certificates {
                validate_artifact_name("common name", common_name).map_err(|error| {
                    DistributionError::InvalidRequest(format!("role '{role}': {error}"))
                })?;
            }
        }
        Ok(())
    }
}
