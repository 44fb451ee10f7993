#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use crate::credentials::CredentialError;
    use crate::messaging::error::{
        friendly_message, from_api_response, map_api_error_code, map_topic_management_reason, ErrorResponse, FcmError,
    };

    #[test]
    fn known_codes_get_their_text() {
        assert_eq!(
            friendly_message("messaging/registration-token-not-registered", "ignored"),
            "The provided registration token is not registered or has expired. (messaging/registration-token-not-registered)"
        );
        assert_eq!(
            friendly_message("ETIMEDOUT", "ignored"),
            "Network error: Connection to Firebase servers timed out. Please check your internet connection. (ETIMEDOUT)"
        );
    }

    #[test]
    fn unknown_firebase_codes_keep_the_provider_message() {
        assert_eq!(
            friendly_message("messaging/third-party-auth-error", "APNs certificate rejected"),
            "Firebase error: APNs certificate rejected (messaging/third-party-auth-error)"
        );
        assert_eq!(friendly_message("EPIPE", "broken pipe"), "Error: broken pipe");
    }

    #[test]
    fn api_codes_map_to_provider_codes() {
        assert_eq!(map_api_error_code("UNREGISTERED"), "messaging/registration-token-not-registered");
        assert_eq!(map_api_error_code("INVALID_ARGUMENT"), "messaging/invalid-argument");
        assert_eq!(map_api_error_code("UNAVAILABLE"), "messaging/server-unavailable");
        assert_eq!(map_api_error_code("THIRD_PARTY_AUTH_ERROR"), "messaging/authentication-error");
        assert_eq!(map_api_error_code("SENDER_ID_MISMATCH"), "messaging/invalid-recipient");
        assert_eq!(map_api_error_code("QUOTA_EXCEEDED"), "messaging/message-rate-exceeded");
        assert_eq!(map_api_error_code("NOT_FOUND"), "auth/project-not-found");
        assert_eq!(map_api_error_code("SOMETHING_NEW"), "messaging/unknown-error");

        assert_eq!(map_topic_management_reason("NOT_FOUND"), "messaging/registration-token-not-registered");
        assert_eq!(map_topic_management_reason("TOO_MANY_TOPICS"), "messaging/too-many-topics");
    }

    #[test]
    fn detail_error_code_wins_over_status() {
        let body = json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        })
        .to_string();

        let err = from_api_response(StatusCode::NOT_FOUND, &body);
        assert_eq!(err.code(), "messaging/registration-token-not-registered");
        assert!(!err.is_authentication_error());
        match err {
            FcmError::Provider { message, status, .. } => {
                assert_eq!(message, "Requested entity was not found.");
                assert_eq!(status, Some(404));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unauthorized_without_body_is_an_authentication_error() {
        let err = from_api_response(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.code(), "messaging/authentication-error");
        assert!(err.is_authentication_error());
        assert_eq!(
            err.to_string(),
            "An authentication error occurred. Please check your credentials. (messaging/authentication-error)"
        );
    }

    #[test]
    fn status_is_used_without_details() {
        let body = json!({"error": {"code": 400, "message": "bad field", "status": "INVALID_ARGUMENT"}}).to_string();
        let err = from_api_response(StatusCode::BAD_REQUEST, &body);
        assert_eq!(err.code(), "messaging/invalid-argument");
    }

    #[test]
    fn local_errors_have_codes() {
        assert_eq!(FcmError::validation("Topic name is required").code(), "messaging/invalid-argument");
        assert_eq!(
            FcmError::from(CredentialError::InvalidType).code(),
            "app/invalid-credential"
        );
        assert_eq!(
            FcmError::Token(anyhow::anyhow!("boom")).to_string(),
            "failed to obtain access token: boom"
        );
    }

    #[test]
    fn error_response_payload() {
        let err = FcmError::validation("Condition is required");
        let response = ErrorResponse::operation_failed(&err);

        assert!(!response.success);
        assert_eq!(response.error, "Firebase Cloud Messaging operation failed: Condition is required");
        assert_eq!(response.error_code, "messaging/invalid-argument");
        assert!(chrono::DateTime::parse_from_rfc3339(&response.timestamp).is_ok());

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("errorCode").is_some());
        assert_eq!(ErrorResponse::from(&err).error, "Condition is required");
    }
}
