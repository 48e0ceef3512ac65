mod decryptor;
mod error;
mod value;

pub use decryptor::{EnvDecryptor, PlaintextDecryptor, SecretsDecryptor};
pub use error::SecretError;
pub use value::{SecretMap, SecretValue};
