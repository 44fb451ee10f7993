use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::settings::SettingsConfig;
use crate::credentials::service_account::{validate_service_account_json, ServiceAccountKey};
use crate::credentials::CredentialError;
use crate::messaging::client::{FCM_BASE_URL, IID_BASE_URL};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub projects: BTreeMap<String, ProjectConfig>,
    /// project name or project id used when a request names none
    pub default_project: Option<String>,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

/// ================================
/// Projects (one service account each)
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    /// path to the service account JSON file
    pub service_account_path: Option<String>,
    /// inline service account JSON, usually `${ENV_VAR}`
    pub service_account_json: Option<String>,
    #[serde(default)]
    pub region: Region,
    /// only needed alongside Realtime Database
    pub database_url: Option<String>,
    /// only needed alongside Storage
    pub storage_bucket: Option<String>,
}

impl ProjectConfig {
    /// Load and validate the service account key from the file or inline JSON.
    pub fn load_key(&self) -> Result<ServiceAccountKey, CredentialError> {
        match (&self.service_account_json, &self.service_account_path) {
            (Some(raw), _) if !raw.trim().is_empty() => validate_service_account_json(raw),
            (_, Some(path)) => ServiceAccountKey::from_file(Path::new(path)),
            _ => Err(CredentialError::MissingFields(vec!["service_account".to_string()])),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum Region {
    #[default]
    #[serde(rename = "us-central1")]
    UsCentral1,
    #[serde(rename = "asia-east1")]
    AsiaEast1,
    #[serde(rename = "europe-west1")]
    EuropeWest1,
}

/// ================================
/// Provider endpoints (overridable for tests and proxies)
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointsConfig {
    #[serde(default = "default_fcm_base_url")]
    pub fcm_base_url: String,
    #[serde(default = "default_iid_base_url")]
    pub iid_base_url: String,
    /// overrides the token_uri of every service account
    pub token_uri: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            fcm_base_url: default_fcm_base_url(),
            iid_base_url: default_iid_base_url(),
            token_uri: None,
        }
    }
}

fn default_fcm_base_url() -> String {
    FCM_BASE_URL.to_string()
}

fn default_iid_base_url() -> String {
    IID_BASE_URL.to_string()
}
