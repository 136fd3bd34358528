use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pillar_ca_policy::{PredicateEvaluator, PredicateOutcome};
use pillar_ca_store::{
    CertificateAuthorityStore, FreshnessPolicy, PresentOnDisk, StoreMetrics, StoreMetricsSnapshot,
};

use crate::{
    ArtifactBundle, DistributionError, DistributionRequest, DistributionSettings,
    PredicateFailurePolicy,
};

/// Works out which certificates a requester is owed, issues any that are
/// missing and assembles the bundle.
///
/// Entitlement is additive: nothing issued earlier is revoked or removed.
#[derive(Debug)]
pub struct DistributionResolver<E> {
    evaluator: E,
    settings: DistributionSettings,
    freshness: Arc<dyn FreshnessPolicy>,
    metrics: Arc<StoreMetrics>,
}

impl<E: PredicateEvaluator> DistributionResolver<E> {
    pub fn new(evaluator: E, settings: DistributionSettings) -> Result<Self, DistributionError> {
        settings.validate()?;
        Ok(Self {
            evaluator,
            settings,
            freshness: Arc::new(PresentOnDisk),
            metrics: Arc::new(StoreMetrics::default()),
        })
    }

    pub fn with_freshness_policy(mut self, freshness: Arc<dyn FreshnessPolicy>) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<StoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &DistributionSettings {
        &self.settings
    }

    pub fn metrics_snapshot(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn store(&self) -> Result<CertificateAuthorityStore, DistributionError> {
        let store =
            CertificateAuthorityStore::open(&self.settings.base_path, &self.settings.ca_name)?
                .with_freshness_policy(Arc::clone(&self.freshness))
                .with_key_presence(self.settings.ca_key_presence)
                .with_metrics(Arc::clone(&self.metrics));
        Ok(store)
    }

    /// Union of the certificate names of every role whose expression matches.
    pub fn entitled_certificates(
        &self,
        request: &DistributionRequest,
    ) -> Result<BTreeSet<String>, DistributionError> {
        let requester = request.requester.id.as_str();
        let mut entitled = BTreeSet::new();

        for (role, certificates) in &request.role_certificates {
            let Some(expression) = request.role_assignments.get(role) else {
                tracing::debug!(requester, role = %role, "role has no assignment expression");
                continue;
            };

            match self.evaluator.evaluate(expression, &request.requester) {
                PredicateOutcome::Matched => {
                    tracing::debug!(requester, role = %role, "role matched");
                    entitled.extend(certificates.iter().cloned());
                }
                PredicateOutcome::NotMatched => {
                    tracing::debug!(requester, role = %role, "role not matched");
                }
                PredicateOutcome::EvaluationFailed(reason) => {
                    match self.settings.predicate_failure {
                        PredicateFailurePolicy::TreatAsNoMatch => {
                            tracing::warn!(
                                requester,
                                role = %role,
                                expression = %expression,
                                %reason,
                                "targeting predicate failed; treating role as not matched"
                            );
                        }
                        PredicateFailurePolicy::Abort => {
                            return Err(DistributionError::PredicateFailed {
                                role: role.clone(),
                                reason,
                            });
                        }
                    }
                }
            }
        }
        Ok(entitled)
    }

    pub fn resolve(
        &self,
        request: &DistributionRequest,
    ) -> Result<ArtifactBundle, DistributionError> {
        request.validate()?;
        let options = &self.settings.ca_options;
        let store = self.store()?;
        store.ensure(options)?;

        let entitled = self.entitled_certificates(request)?;
        let issuer = store.issuer();
        for common_name in &entitled {
            issuer.ensure(common_name, &options.for_common_name(common_name))?;
        }

        let mut certificates = BTreeMap::new();
        for common_name in entitled {
            let artifacts = issuer.retrieve(&common_name)?;
            certificates.insert(common_name, artifacts);
        }
        let bundle = ArtifactBundle {
            ca_name: self.settings.ca_name.clone(),
            certificates,
            root_certificate_pem: store.retrieve()?,
        };

        tracing::info!(
            requester = %request.requester.id,
            ca_name = %bundle.ca_name,
            certificates = bundle.certificates.len(),
            "resolved certificate distribution"
        );
        Ok(bundle)
    }
}
