#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use pillar_ca::{
    CaErrorKind, CaKeyPresence, CertificateAuthorityStore, CertificateOptions, DistributionError,
    DistributionRequest, DistributionResolver, DistributionSettings, GlobPredicateEvaluator,
    PredicateFailurePolicy, PredicateOutcome, RequesterIdentity, StoreMetrics, SubjectFields,
};
use x509_parser::pem::parse_x509_pem;

fn ca_options() -> CertificateOptions {
    CertificateOptions::new(SubjectFields {
        country: "US".to_string(),
        state: "NH".to_string(),
        locality: "Wolfeboro".to_string(),
        organization: "Example Infrastructure".to_string(),
        organizational_unit: None,
        common_name: "TestCA".to_string(),
        email_address: "infrastructure@example.org".to_string(),
    })
}

fn settings(base: &Path) -> DistributionSettings {
    DistributionSettings::new(ca_options())
        .with_base_path(base)
        .with_ca_name("TestCA")
}

fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).expect("metadata").permissions().mode() & 0o777
}

#[test]
fn end_to_end_issue_and_redeliver_without_writes() {
    let dir = tempfile::tempdir().expect("temp dir");
    let metrics = Arc::new(StoreMetrics::default());

    let store = CertificateAuthorityStore::open(dir.path(), "TestCA")
        .expect("store")
        .with_metrics(Arc::clone(&metrics));
    store.ensure(&ca_options()).expect("ensure CA");
    let ca_dir = dir.path().join("TestCA");
    assert_eq!(mode_of(&ca_dir.join("TestCA_ca_cert.key")), 0o600);
    assert_eq!(mode_of(&ca_dir.join("TestCA_ca_cert.crt")), 0o644);
    assert_eq!(metrics.snapshot().artifacts_written, 2);

    store
        .issuer()
        .ensure("svc1", &ca_options().for_common_name("svc1"))
        .expect("issue svc1");
    assert_eq!(mode_of(&ca_dir.join("private/svc1.key")), 0o600);
    assert_eq!(mode_of(&ca_dir.join("certs/svc1.crt")), 0o644);
    assert_eq!(metrics.snapshot().artifacts_written, 4);

    let resolver = DistributionResolver::new(GlobPredicateEvaluator, settings(dir.path()))
        .expect("resolver")
        .with_metrics(Arc::clone(&metrics));
    let request = DistributionRequest::new(RequesterIdentity::new("svc1.example.org"))
        .with_role("svc-role", "svc1.*", ["svc1"]);

    let bundle = resolver.resolve(&request).expect("resolve");
    assert_eq!(bundle.common_names().collect::<Vec<_>>(), ["svc1"]);
    assert_eq!(bundle.ca_name, "TestCA");
    assert_eq!(bundle.root_certificate_pem, store.retrieve().expect("CA pem"));
    assert_eq!(
        bundle.certificates["svc1"],
        store.issuer().retrieve("svc1").expect("svc1")
    );

    let pillar = bundle.to_pillar();
    let certificates = pillar["ca"]["certificates"]
        .as_object()
        .expect("certificates object");
    assert_eq!(certificates.len(), 2);
    assert!(certificates["svc1"]["crt"].is_string());
    assert!(certificates["svc1"]["key"].is_string());
    assert!(certificates["TestCA"]["crt"].is_string());
    assert!(certificates["TestCA"].get("key").is_none());

    let again = resolver.resolve(&request).expect("resolve again");
    assert_eq!(again, bundle);
    assert_eq!(metrics.snapshot().artifacts_written, 4);
    assert_eq!(metrics.snapshot().cas_created, 1);
    assert_eq!(metrics.snapshot().leaves_issued, 1);
}

#[test]
fn delivers_exactly_the_union_of_matching_roles() {
    let dir = tempfile::tempdir().expect("temp dir");
    let resolver =
        DistributionResolver::new(GlobPredicateEvaluator, settings(dir.path())).expect("resolver");
    let requester = RequesterIdentity::new("web01.example.org").with_attribute("env", "prod");
    let request = DistributionRequest::new(requester)
        .with_role("web", "web*", ["www", "api"])
        .with_role("prod", "G@env:prod", ["api", "metrics"])
        .with_role("db", "db*", ["postgres"])
        .with_role("other-hosts", "L@other,hosts", ["unused"]);

    let bundle = resolver.resolve(&request).expect("resolve");
    assert_eq!(
        bundle.common_names().collect::<Vec<_>>(),
        ["api", "metrics", "www"]
    );
    assert_eq!(resolver.metrics_snapshot().leaves_issued, 3);

    let certs_dir = dir.path().join("TestCA").join("certs");
    assert!(!certs_dir.join("postgres.crt").exists());
    assert!(!certs_dir.join("unused.crt").exists());
}

#[test]
fn delivered_leaves_chain_to_delivered_root() {
    let dir = tempfile::tempdir().expect("temp dir");
    let resolver =
        DistributionResolver::new(GlobPredicateEvaluator, settings(dir.path())).expect("resolver");
    let request = DistributionRequest::new(RequesterIdentity::new("svc1"))
        .with_role("svc-role", "svc1", ["svc1"]);
    let bundle = resolver.resolve(&request).expect("resolve");

    let (_, root_pem) = parse_x509_pem(bundle.root_certificate_pem.as_bytes()).expect("root pem");
    let root = root_pem.parse_x509().expect("root x509");
    let (_, leaf_pem) =
        parse_x509_pem(bundle.certificates["svc1"].cert_pem.as_bytes()).expect("leaf pem");
    let leaf = leaf_pem.parse_x509().expect("leaf x509");

    assert!(root.is_ca());
    assert_eq!(leaf.issuer().as_raw(), root.subject().as_raw());
    assert!(leaf.verify_signature(Some(root.public_key())).is_ok());
}

#[test]
fn leaves_follow_a_regenerated_root() {
    let dir = tempfile::tempdir().expect("temp dir");
    let settings = settings(dir.path()).with_ca_key_presence(CaKeyPresence::RequireKey);
    let resolver = DistributionResolver::new(GlobPredicateEvaluator, settings).expect("resolver");
    let request = DistributionRequest::new(RequesterIdentity::new("svc1"))
        .with_role("svc-role", "svc1", ["svc1"]);
    let first = resolver.resolve(&request).expect("first resolve");
    fs::remove_file(resolver.store().expect("store").layout().ca_key_path())
        .expect("remove CA key");

    let second = resolver.resolve(&request).expect("resolve after regeneration");
    assert_ne!(second.root_certificate_pem, first.root_certificate_pem);
    assert_ne!(second.certificates["svc1"], first.certificates["svc1"]);

    let (_, root_pem) = parse_x509_pem(second.root_certificate_pem.as_bytes()).expect("root pem");
    let root = root_pem.parse_x509().expect("root x509");
    let (_, leaf_pem) =
        parse_x509_pem(second.certificates["svc1"].cert_pem.as_bytes()).expect("leaf pem");
    let leaf = leaf_pem.parse_x509().expect("leaf x509");
    assert!(leaf.verify_signature(Some(root.public_key())).is_ok());
    assert_eq!(resolver.metrics_snapshot().cas_created, 2);
    assert_eq!(resolver.metrics_snapshot().leaves_issued, 2);
}

#[test]
fn roles_without_assignment_are_not_matched() {
    let dir = tempfile::tempdir().expect("temp dir");
    let resolver =
        DistributionResolver::new(GlobPredicateEvaluator, settings(dir.path())).expect("resolver");
    let mut request = DistributionRequest::new(RequesterIdentity::new("svc1"));
    request
        .role_certificates
        .insert("unassigned".to_string(), ["svc1".to_string()].into());

    let bundle = resolver.resolve(&request).expect("resolve");
    assert!(bundle.certificates.is_empty());
    assert!(!bundle.root_certificate_pem.is_empty());
}

#[test]
fn failing_predicates_are_skipped_by_default() {
    let dir = tempfile::tempdir().expect("temp dir");
    let resolver =
        DistributionResolver::new(GlobPredicateEvaluator, settings(dir.path())).expect("resolver");
    let request = DistributionRequest::new(RequesterIdentity::new("svc1"))
        .with_role("broken", "X@nonsense", ["secret"])
        .with_role("svc-role", "svc*", ["svc1"]);

    let bundle = resolver.resolve(&request).expect("resolve");
    assert_eq!(bundle.common_names().collect::<Vec<_>>(), ["svc1"]);
}

#[test]
fn abort_policy_fails_the_request_on_predicate_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let settings = settings(dir.path()).with_predicate_failure(PredicateFailurePolicy::Abort);
    let evaluator = |expression: &str, _identity: &RequesterIdentity| {
        if expression == "explode" {
            PredicateOutcome::EvaluationFailed("matcher unavailable".to_string())
        } else {
            PredicateOutcome::Matched
        }
    };
    let resolver = DistributionResolver::new(evaluator, settings).expect("resolver");
    let request = DistributionRequest::new(RequesterIdentity::new("svc1"))
        .with_role("a-broken", "explode", ["secret"])
        .with_role("b-fine", "anything", ["svc1"]);

    let error = resolver.resolve(&request).expect_err("abort");
    match &error {
        DistributionError::PredicateFailed { role, reason } => {
            assert_eq!(role, "a-broken");
            assert_eq!(reason, "matcher unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(error.code(), "predicate_failed");
    assert_eq!(resolver.metrics_snapshot().leaves_issued, 0);
}

#[test]
fn missing_ca_key_surfaces_when_issuing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let resolver =
        DistributionResolver::new(GlobPredicateEvaluator, settings(dir.path())).expect("resolver");
    let store = resolver.store().expect("store");
    store.ensure(&ca_options()).expect("ensure CA");
    fs::remove_file(store.layout().ca_key_path()).expect("remove CA key");

    let request = DistributionRequest::new(RequesterIdentity::new("svc1"))
        .with_role("svc-role", "*", ["svc1"]);
    let error = resolver.resolve(&request).expect_err("CA key missing");
    assert!(matches!(&error, DistributionError::Ca(inner) if inner.kind() == CaErrorKind::Io));
    assert_eq!(error.code(), "io");
}

#[test]
fn invalid_settings_are_rejected_up_front() {
    let dir = tempfile::tempdir().expect("temp dir");
    let error = DistributionResolver::new(
        GlobPredicateEvaluator,
        settings(dir.path()).with_ca_name("../escape"),
    )
    .expect_err("unsafe CA name");
    assert_eq!(error.code(), "configuration");
}
