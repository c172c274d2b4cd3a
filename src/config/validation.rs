//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeout > 0, ports valid)
//! - Check that enabled features carry the values they need
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::ProxyConfig;
use crate::security::auth::AuthPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither an HTTP nor an HTTPS listener is configured.
    NoListener,
    /// `timeout_ms` is zero.
    ZeroTimeout,
    /// A listener port is zero.
    ZeroPort(&'static str),
    /// A required path is empty.
    EmptyPath(&'static str),
    /// Basic auth without a username.
    EmptyUsername,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NoListener => write!(f, "no http or https listener configured"),
            ValidationError::ZeroTimeout => write!(f, "timeout_ms must be greater than 0"),
            ValidationError::ZeroPort(which) => write!(f, "{} port must be greater than 0", which),
            ValidationError::EmptyPath(field) => write!(f, "{} must not be empty", field),
            ValidationError::EmptyUsername => write!(f, "basic auth requires a username"),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let listener = &config.listener;

    if listener.http.is_none() && listener.https.is_none() {
        errors.push(ValidationError::NoListener);
    }
    if matches!(&listener.http, Some(http) if http.port == 0) {
        errors.push(ValidationError::ZeroPort("http"));
    }
    if let Some(https) = &listener.https {
        if https.port == 0 {
            errors.push(ValidationError::ZeroPort("https"));
        }
        if https.cert_path.is_empty() {
            errors.push(ValidationError::EmptyPath("https.cert_path"));
        }
        if https.key_path.is_empty() {
            errors.push(ValidationError::EmptyPath("https.key_path"));
        }
    }

    if config.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if matches!(&config.auth, AuthPolicy::Basic { username, .. } if username.is_empty()) {
        errors.push(ValidationError::EmptyUsername);
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
    use crate::config::schema::TlsListenerConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.http = None;
        config.timeout_ms = 0;
        config.auth = AuthPolicy::Basic {
            username: String::new(),
            password: "p".into(),
        };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NoListener,
                ValidationError::ZeroTimeout,
                ValidationError::EmptyUsername,
            ]
        );
    }

    #[test]
    fn https_needs_material() {
        let mut config = ProxyConfig::default();
        config.listener.https = Some(TlsListenerConfig {
            port: 0,
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroPort("https")));
        assert!(errors.contains(&ValidationError::EmptyPath("https.cert_path")));
        assert_eq!(errors.len(), 2);
    }
}
