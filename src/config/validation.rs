//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that every URL-shaped field is usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::GatewayConfig;
use crate::proxy::allow_list::{AllowList, OriginPattern};
use crate::proxy::forwarder::parse_target;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let fw = &config.forwarder;
    check_header(&mut errors, "forwarder.target_header", &fw.target_header);
    check_header(&mut errors, "forwarder.loop_header", &fw.loop_header);
    if !matches!(fw.default_scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "forwarder.default_scheme",
            format!("unsupported scheme '{}'", fw.default_scheme),
        ));
    }
    for (i, pattern) in fw.allowed_origins.iter().enumerate() {
        if let Err(e) = OriginPattern::parse(pattern) {
            errors.push(ValidationError::new(format!("forwarder.allowed_origins[{i}]"), e));
        }
    }
    if let Some(target) = &fw.default_target {
        match parse_target(target, &fw.default_scheme) {
            Err(e) => errors.push(ValidationError::new("forwarder.default_target", e)),
            Ok(url) => {
                // Pattern errors are reported above.
                let denied = AllowList::from_patterns(&fw.allowed_origins)
                    .is_ok_and(|list| !list.allows(&url));
                if denied {
                    errors.push(ValidationError::new(
                        "forwarder.default_target",
                        format!("'{target}' is not covered by forwarder.allowed_origins"),
                    ));
                }
            }
        }
    }

    check_header(&mut errors, "cache.partition_header", &config.cache.partition_header);
    if config.cache.default_partition.trim().is_empty() {
        errors.push(ValidationError::new("cache.default_partition", "must not be empty"));
    }
    if config.cache.default_ttl_secs == 0 {
        errors.push(ValidationError::new("cache.default_ttl_secs", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    let mut names = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{i}].name"),
                format!("duplicate route name '{}'", route.name),
            ));
        }
        if let Some(prefix) = &route.path_prefix {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::new(
                    format!("routes[{i}].path_prefix"),
                    "must start with '/'",
                ));
            }
        }
        if route.cache_ttl_secs == Some(0) {
            errors.push(ValidationError::new(
                format!("routes[{i}].cache_ttl_secs"),
                "must be greater than 0",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{value}' is not a socket address")));
    }
}

fn check_header(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if HeaderName::from_bytes(value.as_bytes()).is_err() {
        errors.push(ValidationError::new(field, format!("'{value}' is not a header name")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_all_errors_are_collected() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".to_string();
        config.forwarder.default_scheme = "ftp".to_string();
        config.forwarder.allowed_origins = vec!["not a pattern".to_string()];
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "forwarder.default_scheme",
                "forwarder.allowed_origins[0]",
                "timeouts.request_secs",
            ]
        );
    }

    #[test]
    fn test_default_target_forms() {
        let mut config = GatewayConfig::default();
        config.forwarder.allowed_origins = vec!["upstream.test".to_string()];

        config.forwarder.default_target = Some("upstream.test".to_string());
        assert!(validate_config(&config).is_ok());

        config.forwarder.default_target = Some("https://upstream.test/base".to_string());
        assert!(validate_config(&config).is_ok());

        config.forwarder.default_target = Some("ftp://upstream.test".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "forwarder.default_target");
    }

    #[test]
    fn test_default_target_outside_allow_list() {
        let mut config = GatewayConfig::default();
        config.forwarder.allowed_origins = vec!["*.upstream.test".to_string()];
        config.forwarder.default_target = Some("https://elsewhere.test".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "forwarder.default_target");
    }

    #[test]
    fn test_duplicate_route_names() {
        let route = RouteConfig {
            name: "dup".to_string(),
            host: None,
            path_prefix: Some("/a".to_string()),
            kind: Default::default(),
            priority: 0,
            cache_ttl_secs: None,
        };
        let mut config = GatewayConfig::default();
        config.routes = vec![route.clone(), route];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "routes[1].name");
    }
}
