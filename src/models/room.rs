use serde::{Deserialize, Serialize};

use super::message::{RoomId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub owner_id: UserId,
    pub is_public: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }

    /// Unknown roles stored by older clients read back as plain members.
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => MemberRole::Admin,
            _ => MemberRole::Member,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub joined_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub is_public: Option<bool>,
}

/// Body shared by invite and remove.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    pub room_id: RoomId,
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRole {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub role: MemberRole,
}
