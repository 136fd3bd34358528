//! Role-based certificate distribution on top of a file-system-backed CA.
//!
//! A [`DistributionResolver`] evaluates each role's targeting expression
//! against the requester, issues the certificates of every matching role and
//! returns them together with the root CA certificate as an
//! [`ArtifactBundle`].

mod bundle;
mod datacenter;
mod errors;
mod resolver;
mod settings;

pub use bundle::ArtifactBundle;
pub use datacenter::{DatacenterAssignment, DatacenterResolver, DatacenterRule};
pub use errors::DistributionError;
pub use resolver::DistributionResolver;
pub use settings::{
    DistributionRequest, DistributionSettings, PredicateFailurePolicy, DEFAULT_BASE_PATH,
    DEFAULT_CA_NAME,
};

pub use pillar_ca_policy::{
    GlobPredicateEvaluator, PredicateEvaluator, PredicateOutcome, RequesterIdentity,
};
pub use pillar_ca_store::{
    CaError, CaErrorKind, CaKeyPresence, CertificateAuthorityStore, CertificateIssuer,
    CertificateOptions, DigestAlgorithm, FreshnessPolicy, LeafArtifacts, PresentOnDisk,
    StoreMetrics, StoreMetricsSnapshot, SubjectFields,
};
