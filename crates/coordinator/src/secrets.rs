//! Secret providers consulted for credentials and sizing overrides.

use async_trait::async_trait;
use std::collections::HashMap;
use uao_common::{Result, UaoError};

/// A store that resolves named secrets.
///
/// Lookups may be slow; callers must not hold the coordination lock while
/// awaiting one.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Resolve `name`, or `SecretNotFound` if the store has no such entry.
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Reads secrets from process environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: Option<String>,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `<prefix><name>` instead of `<name>`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn var_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_string(),
        }
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let var = self.var_name(name);
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(UaoError::SecretNotFound(var)),
        }
    }
}

/// In-memory secrets, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| UaoError::SecretNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticSecretProvider::new().with_secret("API_KEY", "abc");
        assert_eq!(provider.get_secret("API_KEY").await.unwrap(), "abc");

        let err = provider.get_secret("MISSING").await.unwrap_err();
        assert!(matches!(err, UaoError::SecretNotFound(name) if name == "MISSING"));
    }

    #[tokio::test]
    async fn test_env_provider_missing_variable() {
        let provider = EnvSecretProvider::with_prefix("UAO_TEST_SURELY_UNSET_");
        let err = provider.get_secret("VALUE").await.unwrap_err();
        assert!(
            matches!(err, UaoError::SecretNotFound(name) if name == "UAO_TEST_SURELY_UNSET_VALUE")
        );
    }

    #[tokio::test]
    async fn test_env_provider_reads_path() {
        // PATH is set in any environment the tests run in.
        let provider = EnvSecretProvider::new();
        assert!(!provider.get_secret("PATH").await.unwrap().is_empty());
    }
}
