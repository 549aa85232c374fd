use std::path::PathBuf;

/// File looked up in the working directory when no custom-operations
/// location is configured.
pub const DEFAULT_CUSTOM_OPERATIONS_FILE: &str = "custom-operations.json";

/// Server-level configuration for operation dispatch and custom operations.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Definitions file for custom logic operations. `None` falls back to
    /// [`DEFAULT_CUSTOM_OPERATIONS_FILE`] in the working directory, if present.
    pub custom_operations_location: Option<PathBuf>,
    /// Default timeout for operations in milliseconds.
    pub default_operation_timeout_ms: u64,
    /// Maximum number of concurrent operations before load shedding.
    pub max_concurrent_operations: u32,
    /// `info.title` of the published catalog.
    pub catalog_title: String,
    /// `info.version` of the published catalog.
    pub catalog_version: String,
}

impl ServerConfig {
    /// Definitions file to load at startup, if any.
    #[must_use]
    pub fn resolve_custom_operations_location(&self) -> Option<PathBuf> {
        if let Some(location) = &self.custom_operations_location {
            return Some(location.clone());
        }
        std::env::current_dir()
            .ok()
            .map(|dir| dir.join(DEFAULT_CUSTOM_OPERATIONS_FILE))
            .filter(|candidate| candidate.is_file())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            custom_operations_location: None,
            default_operation_timeout_ms: 30_000,
            max_concurrent_operations: 1000,
            catalog_title: "Dev Tools".to_string(),
            catalog_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_location_wins_even_if_missing() {
        let config = ServerConfig {
            custom_operations_location: Some(PathBuf::from("/does/not/exist.json")),
            ..ServerConfig::default()
        };
        assert_eq!(
            config.resolve_custom_operations_location(),
            Some(PathBuf::from("/does/not/exist.json"))
        );
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.default_operation_timeout_ms, 30_000);
        assert_eq!(config.max_concurrent_operations, 1000);
    }
}
