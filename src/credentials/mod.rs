//! Service account credentials and the OAuth2 token generator built on them.

pub mod registry;
pub mod service_account;
pub mod token_source;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Service Account JSON is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Invalid credential type. Must be a service_account.")]
    InvalidType,
    #[error("Invalid private key format.")]
    InvalidPrivateKey,
    #[error("Invalid client email format. Should end with .gserviceaccount.com")]
    InvalidClientEmail,
    #[error("failed to read service account file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
