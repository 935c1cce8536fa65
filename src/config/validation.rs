//! Configuration validation.
//!
//! Serde handles syntax; this checks that the values can actually be used.
//! All problems are reported, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::address::AddressError;
use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// `http.addr` / `http.port` cannot be turned into a bind target.
    #[error("http: {0}")]
    Address(#[from] AddressError),
    /// Metrics are enabled but the endpoint address is not a socket address.
    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
    /// Empty log level.
    #[error("observability.log_level must not be empty")]
    EmptyLogLevel,
}

/// Validate a configuration, collecting every error.
///
/// The listen address is checked against the port the server will actually
/// use: `port_override` when non-zero, `http.port` otherwise.
pub fn validate_config(
    config: &ServerConfig,
    port_override: u16,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.http.bind_target(port_override) {
        errors.push(ValidationError::Address(e));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if observability.log_level.trim().is_empty() {
        errors.push(ValidationError::EmptyLogLevel);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default(), 0).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ServerConfig::default();
        config.http.port = 0;
        config.http.addr = "127.0.0.1".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();
        config.observability.log_level = " ".into();

        let errors = validate_config(&config, 0).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(
            errors[0],
            ValidationError::Address(AddressError::MissingNetwork(_))
        ));
        assert_eq!(errors[1], ValidationError::MetricsAddress("nowhere".into()));
        assert_eq!(errors[2], ValidationError::EmptyLogLevel);
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config, 0).is_ok());
    }

    #[test]
    fn port_override_allows_bare_host() {
        let mut config = ServerConfig::default();
        config.http.addr = "127.0.0.1".into();
        config.http.port = 0;

        assert!(validate_config(&config, 8080).is_ok());
        assert!(matches!(
            validate_config(&config, 0).unwrap_err()[..],
            [ValidationError::Address(AddressError::MissingNetwork(_))]
        ));
    }
}
