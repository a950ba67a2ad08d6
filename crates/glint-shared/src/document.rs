//! The document model shared with the remote store.
//!
//! A [`Document`] is an opaque record: a stable identifier, a map of named
//! fields, and a server-assigned timestamp that is [`Timestamp::Pending`]
//! between a local write and the remote commit. Typed projections decode the
//! field map into per-collection structs; unknown extra fields are ignored.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SharedError;
use crate::types::{DocumentId, UserId};

/// Named fields of a document. Field names follow the remote store's
/// camelCase convention (`imageUrl`, `lastMessageTime`, ...).
pub type Fields = serde_json::Map<String, Value>;

/// Server-assigned commit timestamp.
///
/// `Pending` means the local client has written the document but the remote
/// side has not committed it yet. Pending documents sort as most-recent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Timestamp {
    Pending,
    Committed(DateTime<Utc>),
}

impl Timestamp {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn committed(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending => None,
            Self::Committed(at) => Some(*at),
        }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Pending, Self::Pending) => Ordering::Equal,
            (Self::Pending, Self::Committed(_)) => Ordering::Greater,
            (Self::Committed(_), Self::Pending) => Ordering::Less,
            (Self::Committed(a), Self::Committed(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One record in a remote collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
    pub timestamp: Timestamp,
}

impl Document {
    pub fn new(id: DocumentId, fields: Fields, timestamp: Timestamp) -> Self {
        Self {
            id,
            fields,
            timestamp,
        }
    }

    /// Decode the field map into a typed projection.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, SharedError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(SharedError::Decode)
    }

    /// String field accessor, `None` if absent or not a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Boolean field accessor, defaulting to `false` when absent.
    pub fn bool_field(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A photo post (`posts` collection).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub image_url: String,
    #[serde(default)]
    pub caption: String,
    pub username: String,
}

/// A conversation (`conversations` collection) with its denormalized
/// last-message preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub participant_names: Vec<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
}

/// A message in a conversation sub-collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    pub sender_id: UserId,
    pub sender_username: String,
}

/// Notification type tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

/// A notification (`notifications` collection).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub from_username: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub post_image: Option<String>,
    #[serde(default)]
    pub read: bool,
}

/// A user profile (`users` collection).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub followers: Vec<UserId>,
    #[serde(default)]
    pub following: Vec<UserId>,
}
