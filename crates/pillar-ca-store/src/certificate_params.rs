use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, KeyPair,
    KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};

use crate::{CaError, CertificateOptions, SerialNumber};

// PKCS #9 emailAddress
const EMAIL_ADDRESS_OID: &[u64] = &[1, 2, 840, 113549, 1, 9, 1];

pub(crate) fn generate_key_pair(options: &CertificateOptions) -> Result<KeyPair, CaError> {
    let key = KeyPair::generate_rsa_for(
        options.digest.rsa_signature_algorithm(),
        options.rsa_key_size()?,
    )?;
    Ok(key)
}

pub(crate) fn build_ca_params(
    options: &CertificateOptions,
    serial: SerialNumber,
) -> Result<CertificateParams, CaError> {
    let mut params = base_params(options, &options.subject.common_name, serial)?;
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    Ok(params)
}

pub(crate) fn build_leaf_params(
    options: &CertificateOptions,
    common_name: &str,
    serial: SerialNumber,
) -> Result<CertificateParams, CaError> {
    let mut params = base_params(options, common_name, serial)?;
    params.is_ca = IsCa::NoCa;
    Ok(params)
}

fn base_params(
    options: &CertificateOptions,
    common_name: &str,
    serial: SerialNumber,
) -> Result<CertificateParams, CaError> {
    let (not_before, not_after) = validity_window(options.validity_days)?;

    let mut params = CertificateParams::default();
    params.serial_number = Some(serial.into());
    params.not_before = not_before;
    params.not_after = not_after;
    params.distinguished_name = subject_name(options, common_name)?;
    params.use_authority_key_identifier_extension = true;
    Ok(params)
}

fn subject_name(
    options: &CertificateOptions,
    common_name: &str,
) -> Result<DistinguishedName, CaError> {
    let subject = &options.subject;
    let email = Ia5String::try_from(subject.email_address.clone()).map_err(|error| {
        CaError::InvalidConfiguration(format!("subject.email_address is not IA5: {error}"))
    })?;

    let mut name = DistinguishedName::new();
    name.push(DnType::CountryName, subject.country.clone());
    name.push(DnType::StateOrProvinceName, subject.state.clone());
    name.push(DnType::LocalityName, subject.locality.clone());
    name.push(DnType::OrganizationName, subject.organization.clone());
    if let Some(unit) = &subject.organizational_unit {
        name.push(DnType::OrganizationalUnitName, unit.clone());
    }
    name.push(DnType::CommonName, common_name.to_string());
    name.push(
        DnType::CustomDnType(EMAIL_ADDRESS_OID.to_vec()),
        DnValue::Ia5String(email),
    );
    Ok(name)
}

fn validity_window(days: u32) -> Result<(OffsetDateTime, OffsetDateTime), CaError> {
    let now = OffsetDateTime::now_utc().replace_nanosecond(0).map_err(|error| {
        CaError::InvalidConfiguration(format!("cannot truncate current time: {error}"))
    })?;
    let not_after = now
        .checked_add(Duration::days(i64::from(days)))
        .ok_or_else(|| {
            CaError::InvalidConfiguration(format!(
                "validity_days {days} puts expiry outside the representable range"
            ))
        })?;
    Ok((now, not_after))
}

#[cfg(test)]
mod tests {
    use super::validity_window;

    #[test]
    fn validity_window_spans_whole_days() {
        let (not_before, not_after) = validity_window(365).expect("window");
        assert_eq!((not_after - not_before).whole_seconds(), 365 * 86_400);
        assert_eq!(not_before.nanosecond(), 0);
    }

    #[test]
    fn validity_window_rejects_overflowing_day_counts() {
        assert!(validity_window(u32::MAX).is_err());
    }
}
