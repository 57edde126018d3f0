//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the strategy name before anything is constructed
//! - Check resource sources: parseable URIs, complete docker settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use url::Url;

use crate::config::schema::GatewayConfig;
use crate::pool::strategy;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn error(errors: &mut Vec<ValidationError>, field: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.to_string(),
        message: message.into(),
    });
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = strategy::from_name(&config.gateway.strategy) {
        error(&mut errors, "gateway.strategy", e.to_string());
    }

    for (i, uri) in config.resources.uris.iter().enumerate() {
        if let Err(e) = Url::parse(uri) {
            error(
                &mut errors,
                &format!("resources.uris[{i}]"),
                format!("{uri:?}: {e}"),
            );
        }
    }

    let docker = &config.resources.docker;
    if docker.enabled {
        if docker.endpoint.is_empty() {
            error(
                &mut errors,
                "resources.docker.endpoint",
                "docker discovery is enabled but no engine endpoint is set",
            );
        }
        if docker.retries == 0 {
            error(
                &mut errors,
                "resources.docker.retries",
                "at least one discovery attempt is required",
            );
        }
    } else if config.resources.uris.is_empty() {
        error(
            &mut errors,
            "resources",
            "no static uris and docker discovery is disabled",
        );
    }

    if config.listener.request_timeout_secs == 0 {
        error(
            &mut errors,
            "listener.request_timeout_secs",
            "timeout must be greater than zero",
        );
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

    fn static_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.resources.uris = vec!["http://127.0.0.1:9091".into()];
        config
    }

    #[test]
    fn test_valid_static_config() {
        assert!(validate_config(&static_config()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = static_config();
        config.gateway.strategy = "round-robin".into();
        config.resources.uris.push("not a uri".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "gateway.strategy");
        assert_eq!(errors[1].field, "resources.uris[1]");
    }

    #[test]
    fn test_docker_requires_endpoint() {
        let mut config = GatewayConfig::default();
        config.resources.docker.enabled = true;
        config.resources.docker.retries = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "resources.docker.endpoint"));
        assert!(errors.iter().any(|e| e.field == "resources.docker.retries"));
    }

    #[test]
    fn test_no_resources_at_all() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        assert_eq!(errors[0].field, "resources");
    }
}
