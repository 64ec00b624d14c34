use serde_json::json;
use std::sync::Arc;

use crate::models::message::Message;

/// A frame queued for one session's outbound pump.
#[derive(Debug, Clone)]
pub enum ServerFrame {
    /// A stored message, written as the bare wire envelope.
    Message(Arc<Message>),
    /// Error report for the session that sent a rejected frame.
    Error { code: &'static str, message: String },
}

impl ServerFrame {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        match self {
            ServerFrame::Message(message) => serde_json::to_string(message.as_ref())
                .unwrap_or_else(|_| "{}".to_string()),
            ServerFrame::Error { code, message } => json!({
                "error": {
                    "code": code,
                    "message": message
                }
            })
            .to_string(),
        }
    }
}

/// Close codes sent when the server ends a session.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const INVALID_USER: u16 = 4003;
    pub const SLOW_CONSUMER: u16 = 4008;
    pub const SESSION_TIMED_OUT: u16 = 4009;
}
