//! Response ledger - when each sender last got an auto-reply.
//!
//! Entries are never pruned. Stale ones simply stop blocking replies once
//! the cooldown has passed.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::OwnedMutexGuard;

use crate::gateway::UserId;

/// Held while one handler runs check, send and record for a sender.
pub type SenderTurn = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct ResponseLedger {
    last_response: RwLock<HashMap<UserId, DateTime<Utc>>>,
    turns: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `id` was never answered, or was last answered more than
    /// `cooldown` before `now`.
    pub fn should_respond(&self, id: UserId, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let entries = self
            .last_response
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        match entries.get(&id) {
            None => true,
            Some(last) => now.signed_duration_since(*last) > cooldown,
        }
    }

    pub fn record_response(&self, id: UserId, now: DateTime<Utc>) {
        self.last_response
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, now);
    }

    pub fn last_response(&self, id: UserId) -> Option<DateTime<Utc>> {
        self.last_response
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.last_response
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for exclusive use of `id`'s check-send-record sequence.
    ///
    /// Turns for different senders are independent.
    pub async fn take_turn(&self, id: UserId) -> SenderTurn {
        let turn = {
            let mut turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(turns.entry(id).or_default())
        };
        turn.lock_owned().await
    }
}
