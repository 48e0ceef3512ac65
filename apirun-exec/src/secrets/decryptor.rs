use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::secrets::{SecretError, SecretMap, SecretValue};

/// Turns stored secret values into plaintext.
#[async_trait]
pub trait SecretsDecryptor: Send + Sync {
    async fn decrypt(&self, name: &str, stored: &str) -> Result<SecretValue, SecretError>;

    async fn decrypt_all(&self, stored: &BTreeMap<String, String>) -> Result<SecretMap, SecretError> {
        let mut out = SecretMap::new();
        for (name, value) in stored {
            out.insert(name.clone(), self.decrypt(name, value).await?);
        }
        Ok(out)
    }
}

/// Stored values are already plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextDecryptor;

#[async_trait]
impl SecretsDecryptor for PlaintextDecryptor {
    async fn decrypt(&self, _name: &str, stored: &str) -> Result<SecretValue, SecretError> {
        Ok(SecretValue::from_string(stored.to_string()))
    }
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves `env:NAME` references from the process environment. Values
/// without the prefix are rejected.
#[derive(Clone)]
pub struct EnvDecryptor {
    lookup: Lookup,
}

impl Default for EnvDecryptor {
    fn default() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }
}

impl EnvDecryptor {
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }
}

#[async_trait]
impl SecretsDecryptor for EnvDecryptor {
    async fn decrypt(&self, name: &str, stored: &str) -> Result<SecretValue, SecretError> {
        let Some(var) = stored.trim().strip_prefix("env:").map(str::trim).filter(|v| !v.is_empty()) else {
            return Err(SecretError::decrypt(name, "expected a reference of the form env:NAME"));
        };
        match (self.lookup)(var) {
            Some(value) => Ok(SecretValue::from_string(value)),
            None => Err(SecretError::NotFound {
                name: name.to_string(),
                reference: stored.trim().to_string(),
            }),
        }
    }
}
