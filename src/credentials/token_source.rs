use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::service_account::ServiceAccountKey;
use crate::helpers::time::now_i64;

pub const FCM_SCOPES: &str =
    "https://www.googleapis.com/auth/firebase.messaging https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchanges a signed service account assertion for an OAuth2 access token.
///
/// This is the generator handed to `TokenManager::get_token`.
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenSource {
    key: Arc<ServiceAccountKey>,
    client: Client,
    token_uri: String,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, client: Client) -> Self {
        let token_uri = key.token_uri.to_owned();
        Self {
            key: Arc::new(key),
            client,
            token_uri,
        }
    }

    /// Override the token endpoint (the assertion audience follows it).
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.key.project_id
    }

    pub fn sign_assertion(&self) -> Result<String> {
        let iat = now_i64();
        let claims = AssertionClaims {
            iss: self.key.client_email.to_owned(),
            scope: FCM_SCOPES.to_owned(),
            aud: self.token_uri.to_owned(),
            iat,
            exp: iat + ASSERTION_TTL_SECONDS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.private_key_id.to_owned());

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("service account private key is not a valid RSA PEM")?;
        encode(&header, &claims, &encoding_key).context("failed to sign service account assertion")
    }

    pub async fn fetch_token(&self) -> Result<String> {
        let assertion = self.sign_assertion()?;
        let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self.client.post(&self.token_uri).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OAuth2 token request failed: {} {}", status, body));
        }

        let token: TokenResponse = response.json().await?;
        debug!(
            "access token issued for project '{}', expires in {:?} seconds",
            self.key.project_id, token.expires_in
        );
        Ok(token.access_token)
    }
}
