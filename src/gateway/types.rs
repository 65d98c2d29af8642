//! Wire types exchanged with the messaging gateway, and the decoded
//! inbound message the responder works on.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque user identifier assigned by the messaging service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credentials handed to the gateway's login flow.
#[derive(Debug, Clone, Serialize)]
pub struct Login {
    pub app_id: i32,
    pub app_hash: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub session_file: PathBuf,
}

/// The account the gateway is logged in as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl Account {
    /// Full name, or `@username` for accounts without one.
    pub fn display_name(&self) -> String {
        let name = join_name(&self.first_name, &self.last_name);
        match (&self.username, name.is_empty()) {
            (Some(username), true) if !username.is_empty() => format!("@{}", username),
            _ => name,
        }
    }
}

/// Result of a contact listing.
///
/// `NotModified` is the cache-validation short-circuit: the hash sent with the
/// request still matches the account's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContactList {
    Modified {
        user_ids: Vec<UserId>,
        #[serde(default)]
        hash: i64,
    },
    NotModified,
}

/// User entity attached to an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserEntity {
    pub fn display_name(&self) -> String {
        join_name(&self.first_name, &self.last_name)
    }
}

/// Update envelope as delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    NewMessage {
        message: MessageBody,
        #[serde(default)]
        users: Vec<UserEntity>,
    },
    NewChannelMessage {
        message: MessageBody,
    },
    #[serde(other)]
    Unsupported,
}

/// Message payload carried by an update. Only `Message` holds text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Message(Message),
    Service,
    Empty,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Sent by our own account.
    #[serde(default)]
    pub out: bool,
    pub peer: Peer,
    #[serde(default)]
    pub text: String,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub date: Option<DateTime<Utc>>,
}

/// Conversation a message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Peer {
    User { user_id: UserId },
    Chat { chat_id: i64 },
    Channel { channel_id: i64 },
    #[serde(other)]
    Unknown,
}

/// Where an inbound message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerContext {
    /// One-to-one conversation. The only context that can get a reply.
    Direct { sender_id: UserId, sender_name: String },
    Group { chat_id: i64 },
    Channel { channel_id: i64 },
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub text: String,
    pub outgoing: bool,
    pub context: PeerContext,
}

impl Update {
    /// Short name of the update shape, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Update::NewMessage { .. } => "new_message",
            Update::NewChannelMessage { .. } => "new_channel_message",
            Update::Unsupported => "unsupported",
        }
    }

    /// Extract the inbound message, if this update carries a plain message
    /// from a recognized peer.
    pub fn decode(&self) -> Option<InboundMessage> {
        let (body, users) = match self {
            Update::NewMessage { message, users } => (message, users.as_slice()),
            Update::NewChannelMessage { message } => (message, &[][..]),
            Update::Unsupported => return None,
        };

        let MessageBody::Message(message) = body else {
            return None;
        };

        let context = match &message.peer {
            Peer::User { user_id } => PeerContext::Direct {
                sender_id: *user_id,
                sender_name: users
                    .iter()
                    .find(|u| u.id == *user_id)
                    .map(UserEntity::display_name)
                    .unwrap_or_default(),
            },
            Peer::Chat { chat_id } => PeerContext::Group { chat_id: *chat_id },
            Peer::Channel { channel_id } => PeerContext::Channel {
                channel_id: *channel_id,
            },
            Peer::Unknown => return None,
        };

        Some(InboundMessage {
            text: message.text.clone(),
            outgoing: message.out,
            context,
        })
    }
}

fn join_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}
