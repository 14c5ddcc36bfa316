//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[forwarder]\ndefault_target = \"https://upstream.example.com\"\n\n[cache]\ndefault_ttl_secs = 60\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.forwarder.default_target.as_deref(),
            Some("https://upstream.example.com")
        );
        assert_eq!(config.cache.default_ttl_secs, 60);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        assert!(matches!(parse_config("[cache"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_message_lists_every_error() {
        let err = parse_config("[timeouts]\nrequest_secs = 0\nupstream_secs = 0\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("timeouts.request_secs"));
        assert!(message.contains("timeouts.upstream_secs"));
    }
}
