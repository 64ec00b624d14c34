use serde::{Deserialize, Serialize};
use std::fmt;

pub type UserId = u64;
pub type RoomId = u64;
pub type MessageId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            _ => None,
        }
    }
}

/// Where a message is addressed. Exactly one of these per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Direct { recipient_id: UserId },
    Room { room_id: RoomId },
}

/// A stored message, as returned by history queries and pushed to live
/// sessions. Serializes to the wire envelope, with `0` for the unset target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub room_id: RoomId,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub created_at: String,
}

impl Message {
    pub fn target(&self) -> Target {
        if self.room_id != 0 {
            Target::Room {
                room_id: self.room_id,
            }
        } else {
            Target::Direct {
                recipient_id: self.recipient_id,
            }
        }
    }
}

/// A validated message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub target: Target,
    pub content: String,
    pub kind: MessageKind,
}

/// Client-supplied envelope. Server-assigned fields (`id`, `createdAt`) are
/// accepted for compatibility but ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub sender_id: UserId,
    #[serde(default)]
    pub recipient_id: UserId,
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    MissingSender,
    EmptyContent,
    MissingTarget,
    AmbiguousTarget,
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            EnvelopeError::MissingSender => "senderId is required",
            EnvelopeError::EmptyContent => "content must not be empty",
            EnvelopeError::MissingTarget => "one of recipientId or roomId is required",
            EnvelopeError::AmbiguousTarget => "recipientId and roomId are mutually exclusive",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for EnvelopeError {}

impl Envelope {
    pub fn target(&self) -> Result<Target, EnvelopeError> {
        match (self.recipient_id, self.room_id) {
            (0, 0) => Err(EnvelopeError::MissingTarget),
            (recipient_id, 0) => Ok(Target::Direct { recipient_id }),
            (0, room_id) => Ok(Target::Room { room_id }),
            _ => Err(EnvelopeError::AmbiguousTarget),
        }
    }

    pub fn into_new_message(self) -> Result<NewMessage, EnvelopeError> {
        if self.sender_id == 0 {
            return Err(EnvelopeError::MissingSender);
        }
        if self.content.is_empty() {
            return Err(EnvelopeError::EmptyContent);
        }
        let target = self.target()?;
        Ok(NewMessage {
            sender_id: self.sender_id,
            target,
            content: self.content,
            kind: self.kind,
        })
    }
}

/// Body of `POST /rooms/{id}/messages`; the room comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomMessage {
    #[serde(default)]
    pub sender_id: UserId,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}
