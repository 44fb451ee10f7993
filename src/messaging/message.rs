//! Message model in the FCM HTTP v1 shape and the builder that fills it
//! from flat message fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messaging::error::FcmError;

pub const TOPIC_PREFIX: &str = "/topics/";
const EMPTY_DATA: &str = "{}";

/// Recipient of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Token(String),
    Topic(String),
    Condition(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub target: Target,
    #[serde(flatten)]
    pub content: MessageContent,
}

/// Everything in a message except its recipient
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
}

impl MessageContent {
    pub fn to(self, target: Target) -> Message {
        Message { target, content: self }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<AndroidNotification>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_action: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub payload: ApnsPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    pub content_available: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "UPPERCASE", deserialize = "lowercase"))]
pub enum Priority {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    /// notification with optional data payload
    #[default]
    Notification,
    /// data handled by the app, nothing is displayed
    DataOnly,
}

/// Flat message fields as entered for a send operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageFields {
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub priority: Priority,
    pub sound: String,
    pub click_action: String,
    /// JSON object, non-string values are stringified
    pub data: String,
}

impl Default for MessageFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            body: String::new(),
            image_url: String::new(),
            priority: Priority::Normal,
            sound: "default".to_string(),
            click_action: String::new(),
            data: EMPTY_DATA.to_string(),
        }
    }
}

impl MessageFields {
    pub fn build(&self, message_type: MessageType) -> Result<MessageContent, FcmError> {
        let sound = non_empty(&self.sound);
        let click_action = non_empty(&self.click_action);

        let notification = match message_type {
            MessageType::Notification => Some(Notification {
                title: Some(self.title.to_owned()),
                body: Some(self.body.to_owned()),
                image: non_empty(&self.image_url),
            }),
            MessageType::DataOnly => None,
        };

        // sound and click action only decorate a displayed notification
        let android_notification = if notification.is_some() && (sound.is_some() || click_action.is_some()) {
            Some(AndroidNotification {
                sound: sound.to_owned(),
                click_action,
            })
        } else {
            None
        };

        let content_available = match self.priority {
            Priority::High => Some(1),
            Priority::Normal => None,
        };

        Ok(MessageContent {
            notification,
            data: parse_data(&self.data)?,
            android: Some(AndroidConfig {
                priority: Some(self.priority),
                notification: android_notification,
            }),
            apns: Some(ApnsConfig {
                payload: ApnsPayload {
                    aps: Aps { sound, content_available },
                },
            }),
        })
    }
}

/// Parse the data JSON; empty input and `{}` mean no data.
pub fn parse_data(raw: &str) -> Result<Option<BTreeMap<String, String>>, FcmError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == EMPTY_DATA {
        return Ok(None);
    }
    let parsed: Value = serde_json::from_str(raw).map_err(|err| FcmError::InvalidData(err.to_string()))?;
    let object = match parsed {
        Value::Object(object) => object,
        other => {
            return Err(FcmError::InvalidData(format!(
                "expected a JSON object, got {}",
                other
            )))
        }
    };

    let data = object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();
    Ok(Some(data))
}

/// Topic name without the `/topics/` prefix.
pub fn normalize_topic(topic: &str) -> &str {
    topic.strip_prefix(TOPIC_PREFIX).unwrap_or(topic)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
