use serde::{Deserialize, Serialize};

/// Notification type written for bus-arrival reminders.
pub const BUS_ARRIVAL: &str = "bus_arrival";

/// Fields a producer supplies when creating a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
    /// ID of the record that caused this notification (e.g. a reminder).
    pub related_id: Option<String>,
}

/// A persisted notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// UUIDv7 string, time-sortable.
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
    pub related_id: Option<String>,
    pub is_read: bool,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

/// Event sent over the realtime channel to a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPayload {
    pub event: String,
    pub data: serde_json::Value,
}

impl PushPayload {
    /// Realtime mirror of a freshly persisted notification.
    pub fn for_notification(event: &str, notification: &Notification) -> Self {
        Self {
            event: event.to_string(),
            data: serde_json::json!({
                "id": notification.id,
                "type": notification.kind,
                "title": notification.title,
                "content": notification.content,
                "relatedId": notification.related_id,
                "createdAt": notification.created_at,
            }),
        }
    }
}
