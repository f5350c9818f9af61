use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: Option<i64>,
    #[serde(rename = "queueName")]
    pub queue_name: Option<String>,
    #[serde(rename = "messageBody", default)]
    pub message_body: String,
    #[serde(default)]
    pub status: Option<String>,
    pub priority: Option<i32>,
    #[serde(rename = "retryCount")]
    pub retry_count: Option<i32>,
    #[serde(rename = "maxRetries")]
    pub max_retries: Option<i32>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(rename = "processingStartedAt", default)]
    pub processing_started_at: Option<NaiveDateTime>,
    #[serde(rename = "completedAt", default)]
    pub completed_at: Option<NaiveDateTime>,
}

/// Delivery state reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Out of retries
    DeadLetter,
    Unknown,
}

impl MessageStatus {
    pub fn from_str(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_uppercase).as_deref() {
            Some("PENDING") => MessageStatus::Pending,
            Some("PROCESSING") => MessageStatus::Processing,
            Some("COMPLETED") => MessageStatus::Completed,
            Some("FAILED") => MessageStatus::Failed,
            Some("DEAD_LETTER") => MessageStatus::DeadLetter,
            _ => MessageStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Processing => "processing",
            MessageStatus::Completed => "completed",
            MessageStatus::Failed => "failed",
            MessageStatus::DeadLetter => "dead letter",
            MessageStatus::Unknown => "unknown",
        }
    }
}

impl QueueMessage {
    pub fn status(&self) -> MessageStatus {
        MessageStatus::from_str(self.status.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message() {
        let json = r#"{"id": 11, "queueName": "default", "messageBody": "hello",
                       "status": "PENDING", "priority": 0, "retryCount": 0, "maxRetries": 3,
                       "createdAt": "2024-05-01T10:15:30.5", "processingStartedAt": null}"#;
        let message: QueueMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.message_body, "hello");
        assert_eq!(message.status(), MessageStatus::Pending);
        assert!(message.processing_started_at.is_none());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(MessageStatus::from_str(Some("completed")), MessageStatus::Completed);
        assert_eq!(MessageStatus::from_str(Some("FAILED")), MessageStatus::Failed);
        assert_eq!(MessageStatus::from_str(Some("DEAD_LETTER")), MessageStatus::DeadLetter);
        assert_eq!(MessageStatus::from_str(Some("weird")), MessageStatus::Unknown);
        assert_eq!(MessageStatus::from_str(None), MessageStatus::Unknown);
        assert_eq!(MessageStatus::Processing.label(), "processing");
    }
}
