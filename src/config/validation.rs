//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sizes > 0)
//! - Compile every allow/deny pattern once so startup fails on a bad one
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CamoConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use regex::Regex;

use crate::config::schema::CamoConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("signing.hmac_key must not be empty")]
    MissingKey,
    #[error("server_name must be a non-empty printable header value")]
    InvalidServerName,
    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),
    #[error("listener.tls.{0} must not be empty")]
    MissingTlsPath(&'static str),
    #[error("upstream.{0} must be greater than zero")]
    Zero(&'static str),
    #[error("filters.{list} pattern {pattern:?} is invalid: {reason}")]
    InvalidPattern {
        list: &'static str,
        pattern: String,
        reason: String,
    },
    #[error("observability.stats_path {0:?} must start with '/' and be a single segment")]
    InvalidStatsPath(String),
    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &CamoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.signing.hmac_key.is_empty() {
        errors.push(ValidationError::MissingKey);
    }

    if config.server_name.is_empty() || HeaderValue::from_str(&config.server_name).is_err() {
        errors.push(ValidationError::InvalidServerName);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::MissingTlsPath("cert_path"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::MissingTlsPath("key_path"));
        }
    }

    let upstream = &config.upstream;
    if upstream.max_size == 0 {
        errors.push(ValidationError::Zero("max_size"));
    }
    if upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("request_timeout_secs"));
    }
    if upstream.idle_reap_interval_secs == 0 {
        errors.push(ValidationError::Zero("idle_reap_interval_secs"));
    }
    if upstream.follow_redirects && upstream.max_redirects == 0 {
        errors.push(ValidationError::Zero("max_redirects"));
    }

    check_patterns("allow_list", &config.filters.allow_list, &mut errors);
    check_patterns("deny_list", &config.filters.deny_list, &mut errors);

    let obs = &config.observability;
    if obs.stats_enabled {
        let path = &obs.stats_path;
        if !path.starts_with('/') || path.len() < 2 || path[1..].contains('/') {
            errors.push(ValidationError::InvalidStatsPath(path.clone()));
        }
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            obs.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_patterns(list: &'static str, patterns: &[String], errors: &mut Vec<ValidationError>) {
    for pattern in patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::InvalidPattern {
                list,
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    fn valid() -> CamoConfig {
        let mut config = CamoConfig::default();
        config.signing.hmac_key = "test".into();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_missing_key() {
        let config = CamoConfig::default();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::MissingKey]));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid();
        config.upstream.max_size = 0;
        config.upstream.request_timeout_secs = 0;
        config.filters.allow_list.push("[".into());
        config.filters.deny_list.push("(".into());
        config.listener.bind_address = "nope".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::Zero("max_size")));
        assert!(errors.contains(&ValidationError::Zero("request_timeout_secs")));
        assert!(errors.contains(&ValidationError::InvalidBindAddress("nope".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPattern { list: "allow_list", .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPattern { list: "deny_list", .. })));
    }

    #[test]
    fn test_tls_paths_required() {
        let mut config = valid();
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MissingTlsPath("cert_path")])
        );
    }

    #[test]
    fn test_stats_path_checked_when_enabled() {
        let mut config = valid();
        config.observability.stats_path = "/a/b".into();
        assert_eq!(validate_config(&config), Ok(()));

        config.observability.stats_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidStatsPath("/a/b".into())])
        );
    }

    #[test]
    fn test_server_name_must_be_header_safe() {
        let mut config = valid();
        config.server_name = "bad\nname".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidServerName])
        );
    }
}
