//! Provider error codes and the user-facing text for them.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::helpers::time::now_rfc3339;

pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

#[derive(Debug, Error)]
pub enum FcmError {
    /// Error reported by the messaging provider, `code` uses the
    /// `messaging/*`, `app/*`, `auth/*` namespaces.
    #[error("{}", friendly_message(.code, .message))]
    Provider {
        code: String,
        message: String,
        status: Option<u16>,
    },
    #[error("{0}")]
    Validation(String),
    #[error("Invalid JSON in data field: {0}")]
    InvalidData(String),
    #[error("{}", transport_message(.0))]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("failed to obtain access token: {0}")]
    Token(anyhow::Error),
}

impl FcmError {
    pub fn validation(message: impl Into<String>) -> Self {
        FcmError::Validation(message.into())
    }

    pub fn code(&self) -> &str {
        match self {
            FcmError::Provider { code, .. } => code,
            FcmError::Validation(_) | FcmError::InvalidData(_) => "messaging/invalid-argument",
            FcmError::Transport(err) => transport_code(err),
            FcmError::Credential(_) => "app/invalid-credential",
            FcmError::Token(_) => "auth/invalid-credential",
        }
    }

    /// Whether the cached access token should be dropped after this error.
    pub fn is_authentication_error(&self) -> bool {
        match self {
            FcmError::Provider { code, status, .. } => {
                code == "messaging/authentication-error" || *status == Some(StatusCode::UNAUTHORIZED.as_u16())
            }
            _ => false,
        }
    }
}

/// Map a provider error code to the message shown to users.
pub fn friendly_message(code: &str, message: &str) -> String {
    if let Some(text) = known_error_text(code) {
        return format!("{} ({})", text, code);
    }
    if code.starts_with("messaging/") || code.starts_with("app/") || code.starts_with("auth/") {
        return format!("Firebase error: {} ({})", message, code);
    }
    format!("Error: {}", message)
}

fn known_error_text(code: &str) -> Option<&'static str> {
    let text = match code {
        // Messaging errors
        "messaging/registration-token-not-registered" => "The provided registration token is not registered or has expired.",
        "messaging/invalid-argument" => "Invalid argument provided to Firebase messaging service.",
        "messaging/invalid-recipient" => "The recipient of the message is invalid.",
        "messaging/payload-size-limit-exceeded" => "The message payload exceeds the size limit (4KB for data messages).",
        "messaging/invalid-registration-token" => "The registration token is invalid or not registered with FCM.",
        "messaging/invalid-package-name" => "The package name is invalid.",
        "messaging/too-many-topics" => "The maximum number of topics the device can be subscribed to has been exceeded.",
        "messaging/authentication-error" => "An authentication error occurred. Please check your credentials.",
        "messaging/server-unavailable" => "The FCM server is unavailable. Please try again later.",
        "messaging/topic-name-invalid" => "The topic name is invalid. It should match the pattern: [a-zA-Z0-9-_.~%]+",

        // App initialization errors
        "app/invalid-credential" => "The Firebase credential is invalid. Please check your service account configuration.",
        "app/invalid-app-options" => "The Firebase app options are invalid.",
        "app/app-deleted" => "The Firebase app has been deleted.",
        "app/duplicate-app" => "A Firebase app with the same name already exists.",

        // Auth errors
        "auth/invalid-credential" => "The credential used to authenticate is invalid.",
        "auth/invalid-service-account" => "The service account credentials are invalid.",
        "auth/insufficient-permission" => "The credential used does not have sufficient permissions.",
        "auth/project-not-found" => "The Firebase project was not found.",

        // Network errors
        "ECONNREFUSED" => "Network error: Unable to connect to Firebase servers. Please check your internet connection.",
        "ETIMEDOUT" => "Network error: Connection to Firebase servers timed out. Please check your internet connection.",
        "ENOTFOUND" => "Network error: Firebase server hostname not found. Please check your internet connection and DNS settings.",
        _ => return None,
    };
    Some(text)
}

fn transport_message(err: &reqwest::Error) -> String {
    friendly_message(transport_code(err), &err.to_string())
}

fn transport_code(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "ETIMEDOUT"
    } else if err.is_connect() {
        "ECONNREFUSED"
    } else {
        UNKNOWN_ERROR
    }
}

/// HTTP v1 `error.status` / `FcmError.errorCode` to provider code.
pub fn map_api_error_code(api_code: &str) -> &'static str {
    match api_code {
        "UNREGISTERED" => "messaging/registration-token-not-registered",
        "INVALID_ARGUMENT" => "messaging/invalid-argument",
        "SENDER_ID_MISMATCH" => "messaging/invalid-recipient",
        "QUOTA_EXCEEDED" => "messaging/message-rate-exceeded",
        "UNAVAILABLE" => "messaging/server-unavailable",
        "INTERNAL" => "messaging/internal-error",
        "UNAUTHENTICATED" | "THIRD_PARTY_AUTH_ERROR" => "messaging/authentication-error",
        "PERMISSION_DENIED" => "auth/insufficient-permission",
        "NOT_FOUND" => "auth/project-not-found",
        _ => "messaging/unknown-error",
    }
}

/// Instance ID batch API per-token reasons.
pub fn map_topic_management_reason(reason: &str) -> &'static str {
    match reason {
        "NOT_FOUND" => "messaging/registration-token-not-registered",
        "INVALID_ARGUMENT" => "messaging/invalid-registration-token",
        "TOO_MANY_TOPICS" => "messaging/too-many-topics",
        "RESOURCE_EXHAUSTED" => "messaging/too-many-topics",
        "INTERNAL" => "messaging/internal-error",
        _ => "messaging/unknown-error",
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<Value>,
}

/// Build a provider error from a non-success HTTP response.
pub fn from_api_response(status: StatusCode, body: &str) -> FcmError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    let (api_code, message) = match parsed {
        Some(ApiErrorBody { error }) => {
            let detail_code = error
                .details
                .iter()
                .find_map(|detail| detail.get("errorCode").and_then(Value::as_str))
                .map(str::to_owned);
            (detail_code.or(error.status), error.message)
        }
        None => (None, body.trim().to_string()),
    };

    let code = match api_code {
        Some(api_code) => map_api_error_code(&api_code),
        None if status == StatusCode::UNAUTHORIZED => "messaging/authentication-error",
        None if status == StatusCode::SERVICE_UNAVAILABLE => "messaging/server-unavailable",
        None => "messaging/unknown-error",
    };
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };

    FcmError::Provider {
        code: code.to_string(),
        message,
        status: Some(status.as_u16()),
    }
}

/// Standardized failure payload emitted for a failed operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: String,
}

pub const OPERATION_FAILED: &str = "Firebase Cloud Messaging operation failed";

impl ErrorResponse {
    /// Failure payload for a messaging operation, prefixed with the operation context.
    pub fn operation_failed(err: &FcmError) -> Self {
        let mut response = Self::from(err);
        response.error = format!("{}: {}", OPERATION_FAILED, response.error);
        response
    }
}

impl From<&FcmError> for ErrorResponse {
    fn from(err: &FcmError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            error_code: err.code().to_string(),
            timestamp: now_rfc3339(),
        }
    }
}
