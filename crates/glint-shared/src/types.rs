use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a document within its collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identity as assigned by the remote auth collaborator (opaque uid).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed path of a remote collection.
///
/// Messages live in a sub-collection scoped to exactly one conversation;
/// everything else is a top-level collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CollectionPath {
    Posts,
    Users,
    Conversations,
    Notifications,
    /// `conversations/{id}/messages`
    Messages(DocumentId),
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Posts => write!(f, "posts"),
            Self::Users => write!(f, "users"),
            Self::Conversations => write!(f, "conversations"),
            Self::Notifications => write!(f, "notifications"),
            Self::Messages(conversation) => {
                write!(f, "conversations/{conversation}/messages")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_path_renders_parent() {
        let conversation = DocumentId::new();
        let path = CollectionPath::Messages(conversation);
        assert_eq!(
            path.to_string(),
            format!("conversations/{conversation}/messages")
        );
    }
}
