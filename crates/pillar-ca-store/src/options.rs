use std::fmt;
use std::str::FromStr;

use rcgen::{RsaKeySize, SignatureAlgorithm};
use serde::{Deserialize, Serialize};

use crate::CaError;

pub const DEFAULT_KEY_BITS: u32 = 2048;
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    pub(crate) fn rsa_signature_algorithm(self) -> &'static SignatureAlgorithm {
        match self {
            Self::Sha256 => &rcgen::PKCS_RSA_SHA256,
            Self::Sha384 => &rcgen::PKCS_RSA_SHA384,
            Self::Sha512 => &rcgen::PKCS_RSA_SHA512,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(CaError::InvalidConfiguration(format!(
                "unsupported digest algorithm '{other}'"
            ))),
        }
    }
}

/// Whether a CA needs its private key on disk to count as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaKeyPresence {
    /// The certificate alone marks the CA as present; a missing key only
    /// surfaces when the next leaf is issued.
    #[default]
    CertificateOnly,
    /// Certificate and key must both be present, otherwise the CA is regenerated.
    RequireKey,
}

impl CaKeyPresence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CertificateOnly => "certificate_only",
            Self::RequireKey => "require_key",
        }
    }
}

/// Distinguished name fields shared by the CA and every leaf it signs.
///
/// `common_name` names the CA itself; leaves replace it with their own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectFields {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    #[serde(default)]
    pub organizational_unit: Option<String>,
    pub common_name: String,
    pub email_address: String,
}

impl SubjectFields {
    fn validate(&self) -> Result<(), CaError> {
        for (field, value) in [
            ("subject.country", &self.country),
            ("subject.state", &self.state),
            ("subject.locality", &self.locality),
            ("subject.organization", &self.organization),
            ("subject.common_name", &self.common_name),
            ("subject.email_address", &self.email_address),
        ] {
            if value.trim().is_empty() {
                return Err(CaError::InvalidConfiguration(format!(
                    "{field} must not be empty"
                )));
            }
        }

        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CaError::InvalidConfiguration(format!(
                "subject.country must be a two letter code, got '{}'",
                self.country
            )));
        }
        if !self.email_address.is_ascii() {
            return Err(CaError::InvalidConfiguration(
                "subject.email_address must be ASCII".to_string(),
            ));
        }
        if matches!(&self.organizational_unit, Some(unit) if unit.trim().is_empty()) {
            return Err(CaError::InvalidConfiguration(
                "subject.organizational_unit must be omitted rather than empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to mint a CA or leaf certificate.
///
/// Defaults: 2048-bit RSA keys, 365 days of validity, SHA-256 signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertificateOptions {
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
    #[serde(default)]
    pub digest: DigestAlgorithm,
    pub subject: SubjectFields,
}

fn default_key_bits() -> u32 {
    DEFAULT_KEY_BITS
}

fn default_validity_days() -> u32 {
    DEFAULT_VALIDITY_DAYS
}

impl CertificateOptions {
    pub fn new(subject: SubjectFields) -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            validity_days: DEFAULT_VALIDITY_DAYS,
            digest: DigestAlgorithm::default(),
            subject,
        }
    }

    pub fn with_key_bits(mut self, key_bits: u32) -> Self {
        self.key_bits = key_bits;
        self
    }

    pub fn with_validity_days(mut self, validity_days: u32) -> Self {
        self.validity_days = validity_days;
        self
    }

    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Copy of these options with the subject common name replaced.
    pub fn for_common_name(&self, common_name: &str) -> Self {
        let mut options = self.clone();
        options.subject.common_name = common_name.to_string();
        options
    }

    pub fn validate(&self) -> Result<(), CaError> {
        self.rsa_key_size()?;
        if self.validity_days == 0 {
            return Err(CaError::InvalidConfiguration(
                "validity_days must be greater than zero".to_string(),
            ));
        }
        self.subject.validate()
    }

    pub(crate) fn rsa_key_size(&self) -> Result<RsaKeySize, CaError> {
        match self.key_bits {
            2048 => Ok(RsaKeySize::_2048),
            3072 => Ok(RsaKeySize::_3072),
            4096 => Ok(RsaKeySize::_4096),
            other => Err(CaError::InvalidConfiguration(format!(
                "key_bits must be one of 2048, 3072 or 4096, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_subject(common_name: &str) -> SubjectFields {
    SubjectFields {
        country: "US".to_string(),
        state: "NH".to_string(),
        locality: "Wolfeboro".to_string(),
        organization: "Example Infrastructure".to_string(),
        organizational_unit: Some("Infrastructure Team".to_string()),
        common_name: common_name.to_string(),
        email_address: "infrastructure@example.org".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{test_subject, CaKeyPresence, CertificateOptions, DigestAlgorithm};
    use crate::CaErrorKind;

    #[test]
    fn defaults_match_documented_values() {
        let options = CertificateOptions::new(test_subject("Example CA"));
        assert_eq!(options.key_bits, 2048);
        assert_eq!(options.validity_days, 365);
        assert_eq!(options.digest, DigestAlgorithm::Sha256);
        assert_eq!(CaKeyPresence::default(), CaKeyPresence::CertificateOnly);
        options.validate().expect("defaults validate");
    }

    #[test]
    fn deserializes_with_defaults_filled_in() {
        let options: CertificateOptions = serde_json::from_str(
            r#"{
                "subject": {
                    "country": "US",
                    "state": "NH",
                    "locality": "Wolfeboro",
                    "organization": "Example Infrastructure",
                    "common_name": "Example CA",
                    "email_address": "infrastructure@example.org"
                }
            }"#,
        )
        .expect("options json");
        assert_eq!(options.key_bits, 2048);
        assert_eq!(options.digest, DigestAlgorithm::Sha256);
        assert_eq!(options.subject.organizational_unit, None);
    }

    #[test]
    fn parses_digest_names() {
        assert_eq!("sha256".parse::<DigestAlgorithm>().ok(), Some(DigestAlgorithm::Sha256));
        assert_eq!("SHA-384".parse::<DigestAlgorithm>().ok(), Some(DigestAlgorithm::Sha384));
        assert_eq!(" sha512 ".parse::<DigestAlgorithm>().ok(), Some(DigestAlgorithm::Sha512));
        let error = "md5".parse::<DigestAlgorithm>().expect_err("md5 must be rejected");
        assert_eq!(error.kind(), CaErrorKind::Configuration);
    }

    #[test]
    fn rejects_missing_subject_fields() {
        let mut subject = test_subject("Example CA");
        subject.organization = "  ".to_string();
        let error = CertificateOptions::new(subject)
            .validate()
            .expect_err("empty organization must fail");
        assert!(error.to_string().contains("subject.organization"), "{error}");
    }

    #[test]
    fn rejects_unsupported_key_sizes_and_zero_validity() {
        let options = CertificateOptions::new(test_subject("Example CA"));
        let error = options
            .clone()
            .with_key_bits(1024)
            .validate()
            .expect_err("1024-bit keys are not supported");
        assert!(error.to_string().contains("key_bits"), "{error}");

        let error = options
            .with_validity_days(0)
            .validate()
            .expect_err("zero validity must fail");
        assert!(error.to_string().contains("validity_days"), "{error}");
    }

    #[test]
    fn rejects_malformed_country_and_email() {
        let mut subject = test_subject("Example CA");
        subject.country = "USA".to_string();
        assert!(CertificateOptions::new(subject).validate().is_err());

        let mut subject = test_subject("Example CA");
        subject.email_address = "infrastructüre@example.org".to_string();
        assert!(CertificateOptions::new(subject).validate().is_err());
    }

    #[test]
    fn for_common_name_only_swaps_the_common_name() {
        let options = CertificateOptions::new(test_subject("Example CA")).with_validity_days(30);
        let leaf = options.for_common_name("svc1");
        assert_eq!(leaf.subject.common_name, "svc1");
        assert_eq!(leaf.subject.organization, options.subject.organization);
        assert_eq!(leaf.validity_days, 30);
        assert_eq!(options.subject.common_name, "Example CA");
    }
}
