// tests/common/mod.rs
#![cfg(test)]

use reqwest::Client;
use serde_json::Value;

use crate::credentials::service_account::ServiceAccountKey;

pub const SERVICE_ACCOUNT_FIXTURE: &str = include_str!("../fixtures/service_account.json");
pub const FIXTURE_PROJECT_ID: &str = "demo-push";

pub fn fixture_key() -> ServiceAccountKey {
    serde_json::from_str(SERVICE_ACCOUNT_FIXTURE).expect("fixture service account")
}

/// Fixture service account with some fields replaced (`Value::Null` removes one).
pub fn service_account_with(overrides: &[(&str, Value)]) -> String {
    let mut document: Value = serde_json::from_str(SERVICE_ACCOUNT_FIXTURE).expect("fixture json");
    let object = document.as_object_mut().expect("fixture object");
    for (field, value) in overrides {
        if value.is_null() {
            object.remove(*field);
        } else {
            object.insert(field.to_string(), value.clone());
        }
    }
    document.to_string()
}

/// Registration token shaped like the real ones: long and containing a colon.
pub fn device_token(tag: &str) -> String {
    format!("{}:APA91b{}", tag, "x".repeat(140))
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}
