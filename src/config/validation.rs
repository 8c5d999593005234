//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs
//! - Check the role has what it needs (a replica needs an upstream)
//! - Validate value ranges (intervals and timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{NodeRole, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &str, message: String| {
        errors.push(ValidationError {
            field: field.to_string(),
            message,
        })
    };

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        fail(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        );
    }

    if config.timeouts.call_secs == 0 {
        fail("timeouts.call_secs", "must be greater than 0".to_string());
    }
    if config.timeouts.request_secs == 0 {
        fail("timeouts.request_secs", "must be greater than 0".to_string());
    }
    if config.node.slaves_grace_secs == 0 {
        fail("node.slaves_grace_secs", "must be greater than 0".to_string());
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        fail(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        );
    }

    for writer in &config.auth.writers {
        if !config.auth.tokens.contains_key(writer) {
            fail("auth.writers", format!("writer '{}' has no token", writer));
        }
    }

    match config.node.role {
        NodeRole::Master => {
            if config.master.history_max_length == 0 {
                fail("master.history_max_length", "must be at least 1".to_string());
            }
        }
        NodeRole::Replica => {
            let replica = &config.replica;
            if replica.master_url.is_none() && replica.servers.is_empty() && replica.gateway_url.is_none() {
                fail(
                    "replica",
                    "one of master_url, servers or gateway_url is required".to_string(),
                );
            }
            if replica.refresh_interval_secs == 0 {
                fail("replica.refresh_interval_secs", "must be greater than 0".to_string());
            }
            if replica.propagation_interval_secs == 0 {
                fail("replica.propagation_interval_secs", "must be greater than 0".to_string());
            }
            if replica.auto_publish && replica.automatic && replica.own_url.is_none() {
                fail("replica.own_url", "required when auto_publish is enabled".to_string());
            }

            let urls = replica
                .own_url
                .iter()
                .map(|u| ("replica.own_url", u))
                .chain(replica.master_url.iter().map(|u| ("replica.master_url", u)))
                .chain(replica.gateway_url.iter().map(|u| ("replica.gateway_url", u)))
                .chain(replica.servers.iter().map(|u| ("replica.servers", u)));
            for (field, url) in urls {
                if !is_http_url(url) {
                    fail(field, format!("'{}' is not an http(s) URL", url));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub(crate) fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.replica.own_url = Some("http://replica:9135".into());
        config.replica.master_url = Some("http://master:9135".into());
        config
    }

    #[test]
    fn test_valid_replica() {
        assert!(validate_config(&replica_config()).is_ok());
    }

    #[test]
    fn test_bad_urls_and_ranges() {
        let mut config = replica_config();
        config.replica.servers = vec!["ftp://x".into(), "http://ok:1".into()];
        config.replica.propagation_interval_secs = 0;
        config.timeouts.call_secs = 0;
        config.node.slaves_grace_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "timeouts.call_secs",
                "node.slaves_grace_secs",
                "replica.propagation_interval_secs",
                "replica.servers"
            ]
        );
    }

    #[test]
    fn test_publish_requires_own_url() {
        let mut config = replica_config();
        config.replica.own_url = None;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "replica.own_url");

        config.replica.auto_publish = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_master_checks() {
        let mut config = ServiceConfig::default();
        config.node.role = NodeRole::Master;
        config.master.history_max_length = 0;
        config.auth.writers.push("alice".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
