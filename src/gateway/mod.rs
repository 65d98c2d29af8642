//! Messaging gateway seam.
//!
//! The session handshake, transport and update delivery all live in an
//! external messaging client. The daemon only sees the four operations of
//! [`Gateway`]; [`bridge::BridgeGateway`] reaches a client process over a
//! UNIX socket.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial module structure

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use error::GatewayError;
pub use types::{
    Account, ContactList, InboundMessage, Login, Message, MessageBody, Peer, PeerContext, Update,
    UserEntity, UserId,
};

/// Operations the daemon consumes from the messaging client.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Log in (or resume the persisted session) and return our own account.
    async fn authorize(&self, login: &Login) -> Result<Account, GatewayError>;

    /// List the account's contacts. `hash` is the value returned by the
    /// previous listing, or 0 to force a full answer.
    async fn list_contacts(&self, hash: i64) -> Result<ContactList, GatewayError>;

    /// Send a plain-text message to a user.
    async fn send_text(&self, to: UserId, text: &str) -> Result<(), GatewayError>;

    /// Start receiving updates. The channel closes when the gateway stops
    /// delivering.
    async fn subscribe(&self) -> Result<mpsc::Receiver<Update>, GatewayError>;
}
