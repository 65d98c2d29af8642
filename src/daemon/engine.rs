//! Auto-responder engine - decides, per inbound update, whether to reply.
//!
//! Steps for each update: decode, drop outgoing, drop group/channel, resolve
//! sender, contact check, cooldown check, send, record. Only the send can
//! fail; everything before it either drops the update or moves on.
//!
//! A sender's cooldown check, send and record run under that sender's turn
//! (see [`ResponseLedger::take_turn`]), so concurrent messages from one
//! contact produce at most one reply per cooldown window. A failed send
//! records nothing, and the next message from that sender is still eligible.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::contacts::ContactRegistry;
use crate::daemon::ledger::ResponseLedger;
use crate::daemon::shutdown::Shutdown;
use crate::gateway::{Gateway, GatewayError, PeerContext, Update, UserId};

/// Why an update did not get a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not a plain message, or from a peer we do not recognize.
    Unrecognized,
    Outgoing,
    GroupChat,
    Channel,
    NotContact,
    CoolingDown,
}

/// Decision taken for one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Replied { to: UserId },
    Dropped(DropReason),
}

pub struct AutoResponder {
    gateway: Arc<dyn Gateway>,
    contacts: Arc<ContactRegistry>,
    ledger: Arc<ResponseLedger>,
    response_text: String,
    cooldown: Duration,
}

impl AutoResponder {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        contacts: Arc<ContactRegistry>,
        ledger: Arc<ResponseLedger>,
        response_text: impl Into<String>,
        cooldown: Duration,
    ) -> Self {
        Self {
            gateway,
            contacts,
            ledger,
            response_text: response_text.into(),
            cooldown,
        }
    }

    pub fn contacts(&self) -> &ContactRegistry {
        &self.contacts
    }

    pub fn ledger(&self) -> &ResponseLedger {
        &self.ledger
    }

    /// Handle an update using the wall clock.
    pub async fn handle(&self, update: &Update, shutdown: &Shutdown) -> Result<Outcome, GatewayError> {
        self.process(update, None, shutdown).await
    }

    /// Handle an update as if it arrived at `now`.
    pub async fn handle_at(
        &self,
        update: &Update,
        now: DateTime<Utc>,
        shutdown: &Shutdown,
    ) -> Result<Outcome, GatewayError> {
        self.process(update, Some(now), shutdown).await
    }

    async fn process(
        &self,
        update: &Update,
        now: Option<DateTime<Utc>>,
        shutdown: &Shutdown,
    ) -> Result<Outcome, GatewayError> {
        let Some(message) = update.decode() else {
            debug!(kind = update.kind(), "ignoring non-message update");
            return Ok(Outcome::Dropped(DropReason::Unrecognized));
        };

        if message.outgoing {
            debug!("skipping outgoing message");
            return Ok(Outcome::Dropped(DropReason::Outgoing));
        }

        let (sender_id, sender_name) = match message.context {
            PeerContext::Direct {
                sender_id,
                sender_name,
            } => (sender_id, sender_name),
            PeerContext::Group { chat_id } => {
                debug!(chat_id, "ignoring group chat message");
                return Ok(Outcome::Dropped(DropReason::GroupChat));
            }
            PeerContext::Channel { channel_id } => {
                debug!(channel_id, "ignoring channel message");
                return Ok(Outcome::Dropped(DropReason::Channel));
            }
        };

        debug!(sender_id = %sender_id, sender = %sender_name, text = %message.text, "direct message");

        if !self.contacts.is_contact(sender_id) {
            info!(sender_id = %sender_id, sender = %sender_name, "message from non-contact, ignoring");
            return Ok(Outcome::Dropped(DropReason::NotContact));
        }

        let _turn = tokio::select! {
            biased;
            _ = shutdown.triggered() => return Err(GatewayError::Cancelled),
            turn = self.ledger.take_turn(sender_id) => turn,
        };

        let now = now.unwrap_or_else(Utc::now);
        if !self.ledger.should_respond(sender_id, now, self.cooldown) {
            info!(sender_id = %sender_id, sender = %sender_name, "already responded recently, skipping");
            return Ok(Outcome::Dropped(DropReason::CoolingDown));
        }

        let sent = tokio::select! {
            biased;
            _ = shutdown.triggered() => Err(GatewayError::Cancelled),
            sent = self.gateway.send_text(sender_id, &self.response_text) => sent,
        };

        if let Err(e) = sent {
            error!(sender_id = %sender_id, sender = %sender_name, error = %e, "failed to send auto-reply");
            return Err(e);
        }

        self.ledger.record_response(sender_id, now);
        info!(sender_id = %sender_id, sender = %sender_name, "sent auto-reply");

        Ok(Outcome::Replied { to: sender_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::shutdown;
    use crate::gateway::fake::FakeGateway;
    use crate::gateway::{Message, MessageBody, Peer, UserEntity};
    use chrono::TimeZone;

    const REPLY: &str = "I'm not on this app anymore, email me instead.";

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn message(peer: Peer, out: bool) -> Update {
        let users = match &peer {
            Peer::User { user_id } => vec![UserEntity {
                id: *user_id,
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
            }],
            _ => Vec::new(),
        };
        Update::NewMessage {
            message: MessageBody::Message(Message {
                id: 1,
                out,
                peer,
                text: "are you there?".to_string(),
                date: None,
            }),
            users,
        }
    }

    fn direct(from: i64) -> Update {
        message(Peer::User { user_id: UserId(from) }, false)
    }

    async fn responder(gateway: &Arc<FakeGateway>) -> Arc<AutoResponder> {
        let contacts = Arc::new(ContactRegistry::new());
        contacts.refresh(gateway.as_ref()).await.unwrap();
        Arc::new(AutoResponder::new(
            gateway.clone(),
            contacts,
            Arc::new(ResponseLedger::new()),
            REPLY,
            Duration::hours(1),
        ))
    }

    #[tokio::test]
    async fn test_contact_with_hourly_cooldown_scenario() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        let first = engine.handle_at(&direct(42), at(0), &shutdown).await.unwrap();
        assert_eq!(first, Outcome::Replied { to: UserId(42) });
        assert_eq!(gateway.sent(), vec![(UserId(42), REPLY.to_string())]);
        assert_eq!(engine.ledger().last_response(UserId(42)), Some(at(0)));

        let early = engine.handle_at(&direct(42), at(30), &shutdown).await.unwrap();
        assert_eq!(early, Outcome::Dropped(DropReason::CoolingDown));

        let stranger = engine.handle_at(&direct(7), at(0), &shutdown).await.unwrap();
        assert_eq!(stranger, Outcome::Dropped(DropReason::NotContact));
        assert_eq!(gateway.send_count(), 1);

        let later = engine.handle_at(&direct(42), at(61), &shutdown).await.unwrap();
        assert_eq!(later, Outcome::Replied { to: UserId(42) });
        assert_eq!(gateway.send_count(), 2);
        assert_eq!(engine.ledger().last_response(UserId(42)), Some(at(61)));
    }

    #[tokio::test]
    async fn test_reply_exactly_at_cooldown_boundary_is_suppressed() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        engine.handle_at(&direct(42), at(0), &shutdown).await.unwrap();
        let boundary = engine.handle_at(&direct(42), at(60), &shutdown).await.unwrap();

        assert_eq!(boundary, Outcome::Dropped(DropReason::CoolingDown));
        assert_eq!(gateway.send_count(), 1);
    }

    #[tokio::test]
    async fn test_non_contacts_never_trigger_send() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        for id in [0, 1, 7, 41, 43, i64::MAX, -5] {
            let outcome = engine.handle_at(&direct(id), at(0), &shutdown).await.unwrap();
            assert_eq!(outcome, Outcome::Dropped(DropReason::NotContact));
        }
        assert_eq!(gateway.send_count(), 0);
        assert!(engine.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_registry_is_fail_closed() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = AutoResponder::new(
            gateway.clone(),
            Arc::new(ContactRegistry::new()),
            Arc::new(ResponseLedger::new()),
            REPLY,
            Duration::hours(1),
        );
        let (_trigger, shutdown) = shutdown::channel();

        let outcome = engine.handle_at(&direct(42), at(0), &shutdown).await.unwrap();
        assert_eq!(outcome, Outcome::Dropped(DropReason::NotContact));
        assert_eq!(gateway.send_count(), 0);
    }

    #[tokio::test]
    async fn test_outgoing_messages_never_trigger_send() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        let update = message(Peer::User { user_id: UserId(42) }, true);
        let outcome = engine.handle_at(&update, at(0), &shutdown).await.unwrap();

        assert_eq!(outcome, Outcome::Dropped(DropReason::Outgoing));
        assert_eq!(gateway.send_count(), 0);
    }

    #[tokio::test]
    async fn test_group_and_channel_messages_never_trigger_send() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        let group = message(Peer::Chat { chat_id: 42 }, false);
        assert_eq!(
            engine.handle_at(&group, at(0), &shutdown).await.unwrap(),
            Outcome::Dropped(DropReason::GroupChat)
        );

        let channel = Update::NewChannelMessage {
            message: MessageBody::Message(Message {
                id: 2,
                out: false,
                peer: Peer::Channel { channel_id: 42 },
                text: "broadcast".to_string(),
                date: None,
            }),
        };
        assert_eq!(
            engine.handle_at(&channel, at(0), &shutdown).await.unwrap(),
            Outcome::Dropped(DropReason::Channel)
        );
        assert_eq!(gateway.send_count(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_updates_are_dropped() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        let service = Update::NewMessage {
            message: MessageBody::Service,
            users: Vec::new(),
        };
        for update in [service, Update::Unsupported, message(Peer::Unknown, false)] {
            assert_eq!(
                engine.handle_at(&update, at(0), &shutdown).await.unwrap(),
                Outcome::Dropped(DropReason::Unrecognized)
            );
        }
        assert_eq!(gateway.send_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_is_not_recorded() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]));
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        gateway.fail_next_sends(1);
        let failed = engine.handle_at(&direct(42), at(0), &shutdown).await;
        assert!(matches!(failed, Err(GatewayError::RateLimited { .. })));
        assert_eq!(engine.ledger().last_response(UserId(42)), None);

        let retried = engine.handle_at(&direct(42), at(1), &shutdown).await.unwrap();
        assert_eq!(retried, Outcome::Replied { to: UserId(42) });
        assert_eq!(engine.ledger().last_response(UserId(42)), Some(at(1)));
        assert_eq!(gateway.send_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_messages_from_one_contact_reply_once() {
        let gateway = Arc::new(
            FakeGateway::with_contacts(&[42]).with_send_delay(std::time::Duration::from_millis(50)),
        );
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { engine.handle_at(&direct(42), at(0), &shutdown).await })
            })
            .collect();

        let mut replied = 0;
        let mut cooling = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Outcome::Replied { .. } => replied += 1,
                Outcome::Dropped(DropReason::CoolingDown) => cooling += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(replied, 1);
        assert_eq!(cooling, 3);
        assert_eq!(gateway.send_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_message_after_failed_send_still_replies() {
        let gateway = Arc::new(
            FakeGateway::with_contacts(&[42]).with_send_delay(std::time::Duration::from_millis(20)),
        );
        gateway.fail_next_sends(1);
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        let first = tokio::spawn({
            let engine = engine.clone();
            let shutdown = shutdown.clone();
            async move { engine.handle_at(&direct(42), at(0), &shutdown).await }
        });
        let second = tokio::spawn({
            let engine = engine.clone();
            let shutdown = shutdown.clone();
            async move { engine.handle_at(&direct(42), at(0), &shutdown).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Ok(Outcome::Replied { to }) if *to == UserId(42))));
        assert_eq!(gateway.send_count(), 1);
        assert_eq!(engine.ledger().last_response(UserId(42)), Some(at(0)));
    }

    #[tokio::test]
    async fn test_different_contacts_are_answered_concurrently() {
        let gateway = Arc::new(
            FakeGateway::with_contacts(&[1, 2, 3]).with_send_delay(std::time::Duration::from_millis(20)),
        );
        let engine = responder(&gateway).await;
        let (_trigger, shutdown) = shutdown::channel();

        let handles: Vec<_> = [1, 2, 3]
            .into_iter()
            .map(|id| {
                let engine = engine.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { engine.handle_at(&direct(id), at(0), &shutdown).await })
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Ok(Outcome::Replied { .. })));
        }
        assert_eq!(gateway.send_count(), 3);
        assert_eq!(engine.ledger().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_send_fails_without_recording() {
        let gateway = Arc::new(FakeGateway::with_contacts(&[42]).hanging());
        let engine = responder(&gateway).await;
        let (trigger, shutdown) = shutdown::channel();

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.handle_at(&direct(42), at(0), &shutdown).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.trigger();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(GatewayError::Cancelled)));
        assert_eq!(engine.ledger().last_response(UserId(42)), None);
    }
}
