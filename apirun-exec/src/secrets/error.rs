#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret {name} references {reference}, which is not set")]
    NotFound { name: String, reference: String },
    #[error("secret {name} could not be decrypted: {message}")]
    Decrypt { name: String, message: String },
}

impl SecretError {
    pub fn decrypt(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decrypt {
            name: name.into(),
            message: message.into(),
        }
    }
}
