use std::path::Path;

use crate::CaError;

/// Confirms the CA certificate's public key belongs to the CA private key.
#[cfg(feature = "openssl-backend")]
pub(crate) fn validate_ca_material_with_openssl(
    ca_cert_path: &Path,
    cert_pem: &str,
    key_pem: &str,
) -> Result<(), CaError> {
    use openssl::pkey::PKey;
    use openssl::x509::X509;

    let path = ca_cert_path.display();
    let cert = X509::from_pem(cert_pem.as_bytes()).map_err(|error| {
        CaError::InvalidMaterial(format!(
            "openssl could not parse CA certificate {path}: {error}"
        ))
    })?;
    let key = PKey::private_key_from_pem(key_pem.as_bytes()).map_err(|error| {
        CaError::InvalidMaterial(format!(
            "openssl could not parse CA private key for {path}: {error}"
        ))
    })?;
    let public = cert.public_key().map_err(|error| {
        CaError::InvalidMaterial(format!(
            "openssl could not extract the public key of {path}: {error}"
        ))
    })?;
    if !public.public_eq(&key) {
        return Err(CaError::InvalidMaterial(format!(
            "CA certificate {path} does not match its private key"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "openssl-backend"))]
pub(crate) fn validate_ca_material_with_openssl(
    _ca_cert_path: &Path,
    _cert_pem: &str,
    _key_pem: &str,
) -> Result<(), CaError> {
    Ok(())
}
