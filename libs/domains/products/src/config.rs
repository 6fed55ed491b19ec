//! Validator policy configuration

use std::env;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::schema::DEFAULT_NAME_MAX_LEN;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// What to do with keys the schema does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UnknownFieldPolicy {
    /// Report each unknown key as a violation
    #[default]
    Strict,
    /// Drop unknown keys silently
    Lenient,
}

/// Policy knobs for [`crate::validator::ProductValidator`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub unknown_fields: UnknownFieldPolicy,
    /// Maximum product name length, in characters
    pub name_max_len: usize,
    /// Hosts an image URL may point at. A host also matches its subdomains.
    /// Empty accepts any host.
    pub image_hosts: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Strict,
            name_max_len: DEFAULT_NAME_MAX_LEN,
            image_hosts: Vec::new(),
        }
    }
}

impl ValidatorConfig {
    pub fn lenient() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Lenient,
            ..Default::default()
        }
    }

    pub fn with_image_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_hosts = hosts
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Whether `host` is one of the accepted image hosts or a subdomain of one
    pub fn accepts_image_host(&self, host: &str) -> bool {
        if self.image_hosts.is_empty() {
            return true;
        }
        let host = host.to_ascii_lowercase();
        self.image_hosts.iter().any(|allowed| {
            host == *allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl FromEnv for ValidatorConfig {
    /// Reads from environment variables with defaults:
    /// - PRODUCT_UNKNOWN_FIELDS: `strict` or `lenient`, defaults to strict
    /// - PRODUCT_NAME_MAX_LEN: defaults to 200
    /// - PRODUCT_IMAGE_HOSTS: comma-separated hosts, defaults to any host
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let unknown_fields: UnknownFieldPolicy = match env::var("PRODUCT_UNKNOWN_FIELDS") {
            Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::ParseError {
                key: "PRODUCT_UNKNOWN_FIELDS".to_string(),
                details: format!("{}", e),
            })?,
            Err(_) => defaults.unknown_fields,
        };

        let name_max_len: usize = match env::var("PRODUCT_NAME_MAX_LEN") {
            Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::ParseError {
                key: "PRODUCT_NAME_MAX_LEN".to_string(),
                details: format!("{}", e),
            })?,
            Err(_) => defaults.name_max_len,
        };

        let image_hosts: Vec<String> = env::var("PRODUCT_IMAGE_HOSTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            unknown_fields,
            name_max_len,
            ..defaults
        }
        .with_image_hosts(image_hosts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 3] = [
        "PRODUCT_UNKNOWN_FIELDS",
        "PRODUCT_NAME_MAX_LEN",
        "PRODUCT_IMAGE_HOSTS",
    ];

    #[test]
    fn test_from_env_with_defaults() {
        temp_env::with_vars_unset(VARS, || {
            let config = ValidatorConfig::from_env().unwrap();
            assert_eq!(config, ValidatorConfig::default());
            assert_eq!(config.unknown_fields, UnknownFieldPolicy::Strict);
            assert_eq!(config.name_max_len, 200);
            assert!(config.image_hosts.is_empty());
        });
    }

    #[test]
    fn test_from_env_with_custom_values() {
        temp_env::with_vars(
            [
                ("PRODUCT_UNKNOWN_FIELDS", Some("Lenient")),
                ("PRODUCT_NAME_MAX_LEN", Some("80")),
                ("PRODUCT_IMAGE_HOSTS", Some("res.cloudinary.com, CDN.example.com,,")),
            ],
            || {
                let config = ValidatorConfig::from_env().unwrap();
                assert_eq!(config.unknown_fields, UnknownFieldPolicy::Lenient);
                assert_eq!(config.name_max_len, 80);
                assert_eq!(
                    config.image_hosts,
                    vec!["res.cloudinary.com".to_string(), "cdn.example.com".to_string()]
                );
            },
        );
    }

    #[test]
    fn test_from_env_invalid_policy() {
        temp_env::with_vars(
            [
                ("PRODUCT_UNKNOWN_FIELDS", Some("sometimes")),
                ("PRODUCT_NAME_MAX_LEN", None),
                ("PRODUCT_IMAGE_HOSTS", None),
            ],
            || {
                let err = ValidatorConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("PRODUCT_UNKNOWN_FIELDS"));
            },
        );
    }

    #[test]
    fn test_from_env_invalid_name_length() {
        temp_env::with_vars(
            [
                ("PRODUCT_UNKNOWN_FIELDS", None),
                ("PRODUCT_NAME_MAX_LEN", Some("-5")),
                ("PRODUCT_IMAGE_HOSTS", None),
            ],
            || {
                let err = ValidatorConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("PRODUCT_NAME_MAX_LEN"));
            },
        );
    }

    #[test]
    fn test_image_host_matching() {
        let any = ValidatorConfig::default();
        assert!(any.accepts_image_host("anything.test"));

        let config = ValidatorConfig::default().with_image_hosts(["cloudinary.com"]);
        assert!(config.accepts_image_host("cloudinary.com"));
        assert!(config.accepts_image_host("res.Cloudinary.com"));
        assert!(!config.accepts_image_host("evilcloudinary.com"));
        assert!(!config.accepts_image_host("cloudinary.com.evil.test"));
    }
}
