use std::collections::BTreeMap;

use pillar_ca_store::LeafArtifacts;
use serde_json::{json, Map, Value};

/// Certificates owed to one requester plus the root CA certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub ca_name: String,
    pub certificates: BTreeMap<String, LeafArtifacts>,
    pub root_certificate_pem: String,
}

impl ArtifactBundle {
    pub fn common_names(&self) -> impl Iterator<Item = &str> {
        self.certificates.keys().map(String::as_str)
    }

    /// Nested delivery document:
    ///
    /// ```json
    /// {"ca": {"certificates": {"svc1": {"crt": "...", "key": "..."}, "PSFCA": {"crt": "..."}}}}
    /// ```
    ///
    /// A leaf sharing the CA's name is shadowed by the root entry.
    pub fn to_pillar(&self) -> Value {
        let mut certificates = Map::new();
        for (common_name, leaf) in &self.certificates {
            certificates.insert(
                common_name.clone(),
                json!({ "crt": leaf.cert_pem, "key": leaf.key_pem }),
            );
        }
        certificates.insert(
            self.ca_name.clone(),
            json!({ "crt": self.root_certificate_pem }),
        );
        json!({ "ca": { "certificates": certificates } })
    }
}
