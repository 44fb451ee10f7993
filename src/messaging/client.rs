use anyhow::Result as AnyResult;
use futures::future::join_all;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::messaging::error::{from_api_response, map_topic_management_reason, FcmError};
use crate::messaging::message::{Message, TOPIC_PREFIX};

pub const FCM_BASE_URL: &str = "https://fcm.googleapis.com";
pub const IID_BASE_URL: &str = "https://iid.googleapis.com";

#[derive(Debug, Serialize)]
struct SendRequest<'a, M: Serialize> {
    message: &'a M,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<SendOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopicManagementError {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopicManagementResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<TopicManagementError>,
}

#[derive(Debug, Deserialize)]
struct BatchTopicResponse {
    #[serde(default)]
    results: Vec<BatchTopicResult>,
}

#[derive(Debug, Deserialize)]
struct BatchTopicResult {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the FCM v1 send API and the Instance ID topic API
#[derive(Debug, Clone)]
pub struct FcmClient {
    client: Client,
    fcm_base_url: String,
    iid_base_url: String,
}

impl FcmClient {
    pub fn with_base_urls(client: Client, fcm_base_url: impl Into<String>, iid_base_url: impl Into<String>) -> Self {
        Self {
            client,
            fcm_base_url: fcm_base_url.into().trim_end_matches('/').to_string(),
            iid_base_url: iid_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Send one message, returns the provider message name.
    pub async fn send(&self, project_id: &str, access_token: &str, message: &Message) -> Result<String, FcmError> {
        self.send_payload(project_id, access_token, message).await
    }

    /// Send a caller-supplied message document as is.
    pub async fn send_raw(&self, project_id: &str, access_token: &str, message: &Value) -> Result<String, FcmError> {
        self.send_payload(project_id, access_token, message).await
    }

    /// Send every message independently; one failure does not stop the rest.
    pub async fn send_each(&self, project_id: &str, access_token: &str, messages: &[Message]) -> BatchResponse {
        let sends = messages
            .iter()
            .map(|message| self.send(project_id, access_token, message));
        let responses: Vec<SendOutcome> = join_all(sends)
            .await
            .into_iter()
            .map(|outcome| match outcome {
                Ok(message_id) => SendOutcome {
                    success: true,
                    message_id: Some(message_id),
                    error: None,
                    error_code: None,
                },
                Err(err) => SendOutcome {
                    success: false,
                    message_id: None,
                    error_code: Some(err.code().to_string()),
                    error: Some(err.to_string()),
                },
            })
            .collect();

        let success_count = responses.iter().filter(|r| r.success).count();
        BatchResponse {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }

    pub async fn subscribe_to_topic(&self, access_token: &str, tokens: &[String], topic: &str) -> Result<TopicManagementResponse, FcmError> {
        self.manage_topic("batchAdd", access_token, tokens, topic).await
    }

    pub async fn unsubscribe_from_topic(&self, access_token: &str, tokens: &[String], topic: &str) -> Result<TopicManagementResponse, FcmError> {
        self.manage_topic("batchRemove", access_token, tokens, topic).await
    }

    async fn send_payload<M: Serialize>(&self, project_id: &str, access_token: &str, message: &M) -> Result<String, FcmError> {
        let url = format!("{}/v1/projects/{}/messages:send", self.fcm_base_url, project_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&SendRequest { message })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let sent: SendResponse = response.json().await?;
        debug!("message sent: {}", sent.name);
        Ok(sent.name)
    }

    async fn manage_topic(&self, action: &str, access_token: &str, tokens: &[String], topic: &str) -> Result<TopicManagementResponse, FcmError> {
        let url = format!("{}/iid/v1:{}", self.iid_base_url, action);
        let body = json!({
            "to": format!("{}{}", TOPIC_PREFIX, topic),
            "registration_tokens": tokens,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("access_token_auth", "true")
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let batch: BatchTopicResponse = response.json().await?;

        let errors: Vec<TopicManagementError> = batch
            .results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| {
                result.error.as_deref().map(|reason| TopicManagementError {
                    index,
                    reason: map_topic_management_reason(reason).to_string(),
                })
            })
            .collect();
        debug!("{} on topic '{}': {} tokens, {} errors", action, topic, tokens.len(), errors.len());

        Ok(TopicManagementResponse {
            success_count: tokens.len().saturating_sub(errors.len()),
            failure_count: errors.len(),
            errors,
        })
    }
}

async fn ensure_success(response: Response) -> Result<Response, FcmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(from_api_response(status, &body))
}

/// Reusable HTTP client with the agent's defaults.
pub fn build_http_client(timeout_ms: u64) -> AnyResult<Client> {
    Ok(Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()?)
}
