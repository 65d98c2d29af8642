//! In-memory gateway for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{Account, ContactList, Gateway, GatewayError, Login, Update, UserId};

pub(crate) struct FakeGateway {
    contacts: Mutex<Option<ContactList>>,
    seen_hashes: Mutex<Vec<i64>>,
    failing_sends: AtomicUsize,
    send_delay: Option<Duration>,
    hang_sends: bool,
    reject_auth: bool,
    hang_auth: bool,
    sent: Mutex<Vec<(UserId, String)>>,
    updates: Mutex<Option<mpsc::Receiver<Update>>>,
}

impl FakeGateway {
    pub fn with_contacts(ids: &[i64]) -> Self {
        Self {
            contacts: Mutex::new(Some(ContactList::Modified {
                user_ids: ids.iter().copied().map(UserId).collect(),
                hash: 1,
            })),
            seen_hashes: Mutex::new(Vec::new()),
            failing_sends: AtomicUsize::new(0),
            send_delay: None,
            hang_sends: false,
            reject_auth: false,
            hang_auth: false,
            sent: Mutex::new(Vec::new()),
            updates: Mutex::new(None),
        }
    }

    /// Contact listing fails.
    pub fn unreachable() -> Self {
        let gateway = Self::with_contacts(&[]);
        gateway.set_contacts(None);
        gateway
    }

    pub fn set_contacts(&self, list: Option<ContactList>) {
        *self.contacts.lock().unwrap() = list;
    }

    pub fn fail_next_sends(&self, n: usize) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Sends never complete.
    pub fn hanging(mut self) -> Self {
        self.hang_sends = true;
        self
    }

    pub fn rejecting_auth(mut self) -> Self {
        self.reject_auth = true;
        self
    }

    /// Authorization never completes, like a login-code prompt nobody answers.
    pub fn hanging_auth(mut self) -> Self {
        self.hang_auth = true;
        self
    }

    pub fn with_updates(self, rx: mpsc::Receiver<Update>) -> Self {
        *self.updates.lock().unwrap() = Some(rx);
        self
    }

    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn seen_hashes(&self) -> Vec<i64> {
        self.seen_hashes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn authorize(&self, _login: &Login) -> Result<Account, GatewayError> {
        if self.hang_auth {
            std::future::pending::<()>().await;
        }
        if self.reject_auth {
            return Err(GatewayError::Auth("PHONE_CODE_INVALID".to_string()));
        }
        Ok(Account {
            id: UserId(1),
            first_name: "Me".to_string(),
            last_name: String::new(),
            username: Some("me".to_string()),
        })
    }

    async fn list_contacts(&self, hash: i64) -> Result<ContactList, GatewayError> {
        self.seen_hashes.lock().unwrap().push(hash);
        self.contacts.lock().unwrap().clone().ok_or(GatewayError::Closed)
    }

    async fn send_text(&self, to: UserId, text: &str) -> Result<(), GatewayError> {
        if self.hang_sends {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GatewayError::RateLimited { retry_after_secs: 5 });
        }
        self.sent.lock().unwrap().push((to, text.to_string()));
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Update>, GatewayError> {
        self.updates.lock().unwrap().take().ok_or(GatewayError::Closed)
    }
}
