#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use jsonwebtoken::{decode_header, Algorithm};
    use serde_json::{json, Value};

    use crate::credentials::registry::ProjectRegistry;
    use crate::credentials::service_account::{validate_service_account_json, DEFAULT_TOKEN_URI};
    use crate::credentials::token_source::ServiceAccountTokenSource;
    use crate::credentials::CredentialError;
    use crate::tests::common::{
        build_reqwest_client, fixture_key, service_account_with, FIXTURE_PROJECT_ID, SERVICE_ACCOUNT_FIXTURE,
    };

    #[test]
    fn valid_service_account_is_accepted() {
        let key = validate_service_account_json(SERVICE_ACCOUNT_FIXTURE).unwrap();
        assert_eq!(key.project_id, FIXTURE_PROJECT_ID);
        assert_eq!(key.key_type, "service_account");
    }

    #[test]
    fn token_uri_defaults_when_absent() {
        let raw = service_account_with(&[("token_uri", Value::Null)]);
        let key = validate_service_account_json(&raw).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = validate_service_account_json("{not json").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidJson(_)));
        assert!(err.to_string().starts_with("Invalid JSON format: "));
    }

    #[test]
    fn every_missing_field_is_reported() {
        let raw = service_account_with(&[
            ("private_key_id", Value::Null),
            ("client_id", json!("")),
        ]);
        let err = validate_service_account_json(&raw).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Service Account JSON is missing required fields: private_key_id, client_id"
        );
    }

    #[test]
    fn wrong_type_is_rejected() {
        let raw = service_account_with(&[("type", json!("authorized_user"))]);
        let err = validate_service_account_json(&raw).unwrap_err();
        assert_eq!(err.to_string(), "Invalid credential type. Must be a service_account.");
    }

    #[test]
    fn private_key_without_pem_markers_is_rejected() {
        let raw = service_account_with(&[("private_key", json!("MIIEvQIBADANBgkqhkiG9w0BAQEFAASC"))]);
        let err = validate_service_account_json(&raw).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidPrivateKey));
    }

    #[test]
    fn client_email_must_be_a_service_account_address() {
        for email in ["firebase@example.com", "firebase.iam.gserviceaccount.com"] {
            let raw = service_account_with(&[("client_email", json!(email))]);
            let err = validate_service_account_json(&raw).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid client email format. Should end with .gserviceaccount.com",
                "email {}",
                email
            );
        }
    }

    #[test]
    fn assertion_is_signed_with_rs256_and_key_id() {
        let key = fixture_key();
        let source = ServiceAccountTokenSource::new(key.clone(), build_reqwest_client());

        let assertion = source.sign_assertion().unwrap();
        let header = decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(key.private_key_id.as_str()));
        assert_eq!(assertion.split('.').count(), 3);
    }

    #[tokio::test]
    async fn fetch_token_exchanges_assertion_for_access_token() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .header("content-type", "application/x-www-form-urlencoded");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(json!({
                        "access_token": "ya29.fixture-token",
                        "expires_in": 3599,
                        "token_type": "Bearer"
                    }));
            })
            .await;

        let source = ServiceAccountTokenSource::new(fixture_key(), build_reqwest_client())
            .with_token_uri(server.url("/token"));
        let token = source.fetch_token().await.unwrap();

        assert_eq!(token, "ya29.fixture-token");
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_token_reports_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).body(r#"{"error":"invalid_grant"}"#);
            })
            .await;

        let source = ServiceAccountTokenSource::new(fixture_key(), build_reqwest_client())
            .with_token_uri(server.url("/token"));
        let err = source.fetch_token().await.unwrap_err().to_string();

        assert!(err.starts_with("OAuth2 token request failed: 400"), "{}", err);
        assert!(err.contains("invalid_grant"), "{}", err);
    }

    #[test]
    fn registry_reuses_source_for_same_project() {
        let client = build_reqwest_client();
        let mut registry = ProjectRegistry::new();

        registry.register_key("primary", fixture_key(), &client, None);
        registry.register_key("alias", fixture_key(), &client, Some("http://127.0.0.1:1/token"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.project_ids(), vec![FIXTURE_PROJECT_ID.to_string()]);
        assert!(registry.resolve(Some("alias")).is_some());
        assert!(registry.resolve(Some(FIXTURE_PROJECT_ID)).is_some());
        assert!(registry.resolve(Some("unknown")).is_none());
    }

    #[test]
    fn registry_resolves_single_project_without_name() {
        let client = build_reqwest_client();
        let mut registry = ProjectRegistry::new();
        assert!(registry.resolve(None).is_none());

        registry.register_key("only", fixture_key(), &client, None);
        let source = registry.resolve(None).unwrap();
        assert_eq!(source.project_id(), FIXTURE_PROJECT_ID);
    }

    #[test]
    fn registry_rejects_unknown_default() {
        let client = build_reqwest_client();
        let mut registry = ProjectRegistry::new();
        registry.register_key("only", fixture_key(), &client, None);

        assert!(registry.set_default("missing").is_err());
        assert!(registry.set_default("only").is_ok());
    }
}
