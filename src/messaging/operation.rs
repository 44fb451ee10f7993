//! Messaging operations: validate a request, obtain an access token through
//! the token cache and call the provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::token_manager::TokenManager;
use crate::credentials::registry::ProjectRegistry;
use crate::credentials::token_source::ServiceAccountTokenSource;
use crate::messaging::client::FcmClient;
use crate::messaging::error::FcmError;
use crate::messaging::message::{normalize_topic, Message, MessageFields, MessageType, Target};
use crate::messaging::validation::{
    validate_android_config, validate_apns_config, validate_condition, validate_json_format, validate_message_payload,
    validate_token, validate_topic,
};
use crate::observability::metrics::get_metrics;

pub const MAX_MULTICAST_TOKENS: usize = 500;
pub const MAX_TOPIC_MANAGEMENT_TOKENS: usize = 1000;

const AUTHENTICATION_ERROR: &str = "messaging/authentication-error";

static OUTCOME_SUCCESS: &str = "success";
static OUTCOME_FAILURE: &str = "failure";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    #[default]
    SendToToken,
    SendToTopic,
    SendToCondition,
    SubscribeToTopic,
    UnsubscribeFromTopic,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SendToToken => "sendToToken",
            Operation::SendToTopic => "sendToTopic",
            Operation::SendToCondition => "sendToCondition",
            Operation::SubscribeToTopic => "subscribeToTopic",
            Operation::UnsubscribeFromTopic => "unsubscribeFromTopic",
        }
    }
}

/// One operation as submitted by a workflow item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationRequest {
    pub operation: Operation,
    /// project name or id, the default project when absent
    pub project: Option<String>,
    pub device_token: String,
    pub multiple_tokens: bool,
    pub device_tokens: Vec<String>,
    pub topic: String,
    pub condition: String,
    pub registration_tokens: Vec<String>,
    pub message: MessageFields,
    pub message_type: MessageType,
    /// send `message_json` as is instead of building from fields
    pub json_parameters: bool,
    pub message_json: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutput {
    pub success: bool,
    pub result: Value,
}

impl OperationOutput {
    fn success(result: Value) -> Self {
        Self { success: true, result }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    tokens: TokenManager,
    client: FcmClient,
    projects: Arc<ProjectRegistry>,
}

impl Dispatcher {
    pub fn new(tokens: TokenManager, client: FcmClient, projects: Arc<ProjectRegistry>) -> Self {
        Self { tokens, client, projects }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn projects(&self) -> &ProjectRegistry {
        &self.projects
    }

    pub async fn execute(&self, request: &OperationRequest) -> Result<OperationOutput, FcmError> {
        let metrics = get_metrics().await;
        let operation = request.operation.as_str();
        let start = Instant::now();
        debug!("executing {} operation", operation);

        let result = self.dispatch(request).await;

        metrics.messaging_duration.with_label_values(&[operation]).observe(start.elapsed().as_secs_f64());
        let outcome = if result.is_ok() { OUTCOME_SUCCESS } else { OUTCOME_FAILURE };
        metrics.messaging_operations.with_label_values(&[operation, outcome]).inc();
        result
    }

    async fn dispatch(&self, request: &OperationRequest) -> Result<OperationOutput, FcmError> {
        let source = self.resolve_project(request.project.as_deref())?;
        // reject malformed requests before spending a token
        let plan = plan(request)?;
        let access_token = self.access_token(source).await?;
        let project_id = source.project_id();

        let sent = match &plan {
            Plan::Send(message) => {
                debug!("sending message to {:?}", message.target);
                self.client
                    .send(project_id, &access_token, message)
                    .await
                    .map(Value::String)
            }
            Plan::SendRaw(message) => self
                .client
                .send_raw(project_id, &access_token, message)
                .await
                .map(Value::String),
            Plan::SendEach(messages) => {
                debug!("sending multicast message to {} tokens", messages.len());
                let batch = self.client.send_each(project_id, &access_token, messages).await;
                let rejected = batch
                    .responses
                    .iter()
                    .any(|r| r.error_code.as_deref() == Some(AUTHENTICATION_ERROR));
                if rejected {
                    warn!("provider rejected the access token for '{}', dropping it from cache", project_id);
                    self.tokens.invalidate(project_id).await;
                }
                to_value(&batch)
            }
            Plan::Subscribe { tokens, topic } => {
                debug!("subscribing {} tokens to topic: {}", tokens.len(), topic);
                self.client
                    .subscribe_to_topic(&access_token, tokens, topic)
                    .await
                    .and_then(|response| to_value(&response))
            }
            Plan::Unsubscribe { tokens, topic } => {
                debug!("unsubscribing {} tokens from topic: {}", tokens.len(), topic);
                self.client
                    .unsubscribe_from_topic(&access_token, tokens, topic)
                    .await
                    .and_then(|response| to_value(&response))
            }
        };

        match sent {
            Ok(result) => Ok(OperationOutput::success(result)),
            Err(err) => {
                if err.is_authentication_error() {
                    warn!("provider rejected the access token for '{}', dropping it from cache", project_id);
                    self.tokens.invalidate(project_id).await;
                }
                Err(err)
            }
        }
    }

    fn resolve_project(&self, name: Option<&str>) -> Result<&ServiceAccountTokenSource, FcmError> {
        self.projects.resolve(name).ok_or_else(|| match name {
            Some(name) => FcmError::validation(format!("Unknown project '{}'", name)),
            None => FcmError::validation("Project is required when more than one project is configured"),
        })
    }

    async fn access_token(&self, source: &ServiceAccountTokenSource) -> Result<String, FcmError> {
        let project_id = source.project_id();
        let token = self
            .tokens
            .get_token(project_id, move || source.fetch_token())
            .await
            .map_err(FcmError::Token)?;
        debug!("access token ready for project '{}'", project_id);
        Ok(token)
    }
}

/// Validated provider call derived from a request
#[derive(Debug)]
enum Plan {
    Send(Message),
    SendRaw(Value),
    SendEach(Vec<Message>),
    Subscribe { tokens: Vec<String>, topic: String },
    Unsubscribe { tokens: Vec<String>, topic: String },
}

fn plan(request: &OperationRequest) -> Result<Plan, FcmError> {
    match request.operation {
        Operation::SendToToken if request.json_parameters => raw_message(request),
        Operation::SendToToken => plan_send_to_token(request),
        Operation::SendToTopic if request.json_parameters => raw_message(request),
        Operation::SendToTopic => {
            let topic = required_topic(request)?;
            let content = request.message.build(request.message_type)?;
            Ok(Plan::Send(content.to(Target::Topic(topic))))
        }
        Operation::SendToCondition if request.json_parameters => raw_message(request),
        Operation::SendToCondition => {
            let condition = request.condition.trim();
            if condition.is_empty() {
                return Err(FcmError::validation("Condition is required"));
            }
            if !validate_condition(condition) {
                return Err(FcmError::validation(
                    "Invalid condition format. Must include \"in topics\" and logical operators (&&, ||)",
                ));
            }
            let content = request.message.build(request.message_type)?;
            Ok(Plan::Send(content.to(Target::Condition(condition.to_owned()))))
        }
        Operation::SubscribeToTopic => {
            let (tokens, topic) = topic_management(request, "subscribe")?;
            Ok(Plan::Subscribe { tokens, topic })
        }
        Operation::UnsubscribeFromTopic => {
            let (tokens, topic) = topic_management(request, "unsubscribe")?;
            Ok(Plan::Unsubscribe { tokens, topic })
        }
    }
}

fn plan_send_to_token(request: &OperationRequest) -> Result<Plan, FcmError> {
    let content = request.message.build(request.message_type)?;

    if !request.multiple_tokens {
        let token = request.device_token.trim();
        if token.is_empty() {
            return Err(FcmError::validation("Device token is required"));
        }
        if !validate_token(token) {
            return Err(FcmError::validation(format!("Invalid FCM token format: {}", token)));
        }
        return Ok(Plan::Send(content.to(Target::Token(token.to_owned()))));
    }

    let tokens: Vec<&str> = request
        .device_tokens
        .iter()
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(FcmError::validation("At least one device token is required"));
    }
    if tokens.len() > MAX_MULTICAST_TOKENS {
        return Err(FcmError::validation(format!(
            "Maximum of {} tokens allowed in a single multicast request",
            MAX_MULTICAST_TOKENS
        )));
    }
    let invalid: Vec<&str> = tokens.iter().copied().filter(|token| !validate_token(token)).collect();
    if !invalid.is_empty() {
        return Err(FcmError::validation(format!("Invalid FCM token format: {}", invalid.join(", "))));
    }

    let messages = tokens
        .into_iter()
        .map(|token| content.clone().to(Target::Token(token.to_owned())))
        .collect();
    Ok(Plan::SendEach(messages))
}

fn raw_message(request: &OperationRequest) -> Result<Plan, FcmError> {
    if !validate_json_format(&request.message_json) {
        return Err(FcmError::validation("Message JSON must be a valid JSON object"));
    }
    let message: Value = serde_json::from_str(&request.message_json)
        .map_err(|err| FcmError::validation(format!("Invalid message JSON: {}", err)))?;
    if !message.is_object() {
        return Err(FcmError::validation("Message JSON must be a valid JSON object"));
    }
    check_raw_message(&message)?;
    Ok(Plan::SendRaw(message))
}

/// Structural checks only; recipients are left to the provider.
fn check_raw_message(message: &Value) -> Result<(), FcmError> {
    let android = message.get("android");
    let apns = message.get("apns");
    if android.is_some_and(|config| !validate_android_config(config)) {
        return Err(FcmError::validation("Invalid android configuration in message JSON"));
    }
    if apns.is_some_and(|config| !validate_apns_config(config)) {
        return Err(FcmError::validation("Invalid apns configuration in message JSON"));
    }
    if android.is_none() && apns.is_none() && !validate_message_payload(message) {
        return Err(FcmError::validation(
            "Message JSON must contain a notification or data object",
        ));
    }
    Ok(())
}

fn required_topic(request: &OperationRequest) -> Result<String, FcmError> {
    let topic = normalize_topic(request.topic.trim());
    if topic.is_empty() {
        return Err(FcmError::validation("Topic name is required"));
    }
    if !validate_topic(topic) {
        return Err(FcmError::validation(
            "Invalid topic format. Topics must match pattern [a-zA-Z0-9-_.~%]+",
        ));
    }
    Ok(topic.to_owned())
}

fn topic_management(request: &OperationRequest, action: &str) -> Result<(Vec<String>, String), FcmError> {
    let topic = required_topic(request)?;
    let tokens: Vec<String> = request
        .registration_tokens
        .iter()
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(FcmError::validation("At least one registration token is required"));
    }
    if tokens.len() > MAX_TOPIC_MANAGEMENT_TOKENS {
        return Err(FcmError::validation(format!(
            "Maximum of {} tokens allowed in a single {} request",
            MAX_TOPIC_MANAGEMENT_TOKENS, action
        )));
    }
    Ok((tokens, topic))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, FcmError> {
    serde_json::to_value(value).map_err(|err| FcmError::validation(err.to_string()))
}
