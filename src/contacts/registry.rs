//! Contact registry - the set of user IDs in the account's address book.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::gateway::{ContactList, Gateway, GatewayError, UserId};

/// Loaded contact set plus the hash the gateway reported for it.
#[derive(Debug)]
struct Snapshot {
    ids: HashSet<UserId>,
    hash: i64,
}

/// What a refresh did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Replaced { count: usize },
    Unchanged,
}

/// Known contacts, refreshed from the gateway.
///
/// Until the first successful refresh the registry is uninitialized and
/// `is_contact` answers `false` for everyone.
#[derive(Debug, Default)]
pub struct ContactRegistry {
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl ContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload contacts from the gateway.
    ///
    /// A modified listing replaces the whole set; a not-modified listing
    /// leaves it as it is. Gateway failures propagate unchanged.
    pub async fn refresh(&self, gateway: &dyn Gateway) -> Result<RefreshOutcome, GatewayError> {
        let hash = self.current().map(|s| s.hash).unwrap_or(0);

        match gateway.list_contacts(hash).await? {
            ContactList::Modified { user_ids, hash } => {
                let ids: HashSet<UserId> = user_ids.into_iter().collect();
                let count = ids.len();
                info!(count, "loaded contacts");

                let mut sorted: Vec<_> = ids.iter().copied().collect();
                sorted.sort();
                debug!(ids = ?sorted, "contact user IDs");

                *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::new(Snapshot { ids, hash }));
                Ok(RefreshOutcome::Replaced { count })
            }
            ContactList::NotModified => {
                if self.is_loaded() {
                    info!("contacts not modified, using cached version");
                } else {
                    warn!("gateway reported contacts not modified but none are cached; registry stays empty");
                }
                Ok(RefreshOutcome::Unchanged)
            }
        }
    }

    pub fn is_contact(&self, id: UserId) -> bool {
        self.current().is_some_and(|s| s.ids.contains(&id))
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    pub fn len(&self) -> usize {
        self.current().map_or(0, |s| s.ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
