use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use pillar_ca::{DatacenterRule, DistributionRequest, DistributionSettings};
use serde::Deserialize;

pub const ENV_BASE_PATH: &str = "PILLAR_CA_BASE_PATH";
pub const ENV_CA_NAME: &str = "PILLAR_CA_NAME";

/// Settings file layout: distribution settings plus optional datacenter rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub distribution: DistributionSettings,
    #[serde(default)]
    pub datacenters: Vec<DatacenterRule>,
}

impl CliConfig {
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path).map_err(|error| {
            io::Error::new(
                error.kind(),
                format!("failed to read settings file {}: {error}", path.display()),
            )
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid settings file {}: {error}", path.display()),
            )
        })
    }

    pub fn apply_env_overrides(&mut self) -> io::Result<()> {
        if let Some(base_path) = optional_env_value(ENV_BASE_PATH, env::var(ENV_BASE_PATH))? {
            self.distribution.base_path = PathBuf::from(base_path);
        }
        if let Some(ca_name) = optional_env_value(ENV_CA_NAME, env::var(ENV_CA_NAME))? {
            self.distribution.ca_name = ca_name;
        }
        Ok(())
    }
}

/// Reads a request from `path`, or from stdin when `path` is `-`.
pub fn load_request(path: &Path) -> io::Result<DistributionRequest> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        raw
    } else {
        fs::read_to_string(path).map_err(|error| {
            io::Error::new(
                error.kind(),
                format!("failed to read request file {}: {error}", path.display()),
            )
        })?
    };
    serde_json::from_str(&raw).map_err(|error| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid distribution request: {error}"),
        )
    })
}

/// Trimmed value of an environment variable; unset and blank are both `None`.
pub fn optional_env_value(
    name: &str,
    value: Result<String, env::VarError>,
) -> io::Result<Option<String>> {
    let value = match value {
        Ok(raw) => raw.trim().to_string(),
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{name} must be valid UTF-8"),
            ))
        }
    };
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::env::VarError;
    use std::ffi::OsString;

    use pillar_ca::PredicateFailurePolicy;

    use super::{optional_env_value, CliConfig};

    #[test]
    fn env_values_are_trimmed_and_blank_means_unset() {
        assert_eq!(
            optional_env_value("X", Ok("  /srv/pki ".to_string())).expect("value"),
            Some("/srv/pki".to_string())
        );
        assert_eq!(optional_env_value("X", Ok("   ".to_string())).expect("blank"), None);
        assert_eq!(optional_env_value("X", Err(VarError::NotPresent)).expect("unset"), None);
        let error = optional_env_value("X", Err(VarError::NotUnicode(OsString::new())))
            .expect_err("non unicode");
        assert!(error.to_string().contains("UTF-8"), "{error}");
    }

    #[test]
    fn parses_flattened_settings_with_datacenters() {
        let config: CliConfig = serde_json::from_str(
            r#"{
                "base_path": "/srv/pki",
                "ca_name": "TestCA",
                "predicate_failure": "abort",
                "ca_options": {
                    "validity_days": 90,
                    "subject": {
                        "country": "US",
                        "state": "NH",
                        "locality": "Wolfeboro",
                        "organization": "Example Infrastructure",
                        "common_name": "TestCA",
                        "email_address": "infrastructure@example.org"
                    }
                },
                "datacenters": [
                    { "pattern": "*.iad1.example.org", "datacenter": "iad1" }
                ]
            }"#,
        )
        .expect("config json");
        assert_eq!(config.distribution.ca_name, "TestCA");
        assert_eq!(
            config.distribution.predicate_failure,
            PredicateFailurePolicy::Abort
        );
        assert_eq!(config.distribution.ca_options.validity_days, 90);
        assert_eq!(config.datacenters.len(), 1);
        assert_eq!(config.datacenters[0].datacenter, "iad1");
    }
}
