//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// `port_override` is the port passed on the command line (0 for none).
pub fn load_config(path: &Path, port_override: u16) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content, port_override)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str, port_override: u16) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config, port_override).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_invalid_values() {
        let err = parse_config("[http]\naddr = \"sctp:1.2.3.4\"\nport = 0\n", 0).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().starts_with("Validation failed: http:"));
    }

    #[test]
    fn parse_rejects_bad_toml() {
        assert!(matches!(
            parse_config("[http\nport = 1", 0),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/stagehand.toml"), 0).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bare_host_with_zero_port_needs_override() {
        let toml = "[http]\naddr = \"127.0.0.1\"\nport = 0\n";
        assert!(matches!(
            parse_config(toml, 0),
            Err(ConfigError::Validation(_))
        ));

        let config = parse_config(toml, 8080).unwrap();
        let target = config.http.bind_target(8080).unwrap();
        assert_eq!(target.to_string(), "tcp:127.0.0.1:8080");
    }
}
