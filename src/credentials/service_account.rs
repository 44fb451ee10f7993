use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::CredentialError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SERVICE_ACCOUNT_TYPE: &str = "service_account";

const REQUIRED_FIELDS: [&str; 6] = [
    "type",
    "project_id",
    "private_key_id",
    "private_key",
    "client_email",
    "client_id",
];

/// Google service account key as downloaded from the Firebase console
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.display().to_string(),
            source,
        })?;
        validate_service_account_json(&content)
    }
}

/// Parse and validate a service account JSON document.
///
/// All missing required fields are reported together; the type, private key
/// markers and client email domain are checked afterwards in that order.
pub fn validate_service_account_json(raw: &str) -> Result<ServiceAccountKey, CredentialError> {
    let parsed: Value = serde_json::from_str(raw)?;

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| !is_present(parsed.get(**field)))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CredentialError::MissingFields(missing));
    }

    let key: ServiceAccountKey = serde_json::from_value(parsed)?;
    if key.key_type != SERVICE_ACCOUNT_TYPE {
        return Err(CredentialError::InvalidType);
    }
    if !key.private_key.contains("BEGIN PRIVATE KEY") || !key.private_key.contains("END PRIVATE KEY") {
        return Err(CredentialError::InvalidPrivateKey);
    }
    if !key.client_email.contains('@') || !key.client_email.ends_with(".gserviceaccount.com") {
        return Err(CredentialError::InvalidClientEmail);
    }
    Ok(key)
}

// empty strings, null and false count as absent
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(true, |n| n != 0.0),
        Some(_) => true,
    }
}
