//! Connected sessions, as seen from inside the scheduler.
//!
//! An account exists from the moment a session's join action is applied
//! until its disconnect action is applied. It holds the session's delivery
//! handles and, once the player picked a name, which character it controls.
//! The table also enforces the server's capacity limit.

use log::info;
use std::collections::HashMap;
use std::time::Instant;

use crate::mailbox::Outbox;
use crate::SessionId;

#[derive(Debug)]
pub struct Account {
    pub id: SessionId,
    pub outbox: Outbox,
    /// Name of the character this session controls, once logged in
    pub character: Option<String>,
    pub connected_at: Instant,
}

impl Account {
    /// A freshly joined session that has not picked a character yet.
    pub fn new(id: SessionId, outbox: Outbox) -> Self {
        Self {
            id,
            outbox,
            character: None,
            connected_at: Instant::now(),
        }
    }

    /// True once the session controls a character.
    pub fn in_world(&self) -> bool {
        self.character.is_some()
    }
}

/// Table of every session the world loop currently knows about.
///
/// Keyed by session id. Only the scheduler holds it, so it needs no
/// locking. Capacity is checked on join only; a full table never evicts.
pub struct AccountManager {
    accounts: HashMap<SessionId, Account>,
    max_clients: usize,
}

impl AccountManager {
    /// Creates an empty table that admits at most `max_clients` sessions.
    pub fn new(max_clients: usize) -> Self {
        Self {
            accounts: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a session. Returns false when the server is at capacity.
    pub fn add_account(&mut self, id: SessionId, outbox: Outbox) -> bool {
        if self.accounts.len() >= self.max_clients && !self.accounts.contains_key(&id) {
            return false;
        }

        info!("Session {} joined", id);
        self.accounts.insert(id, Account::new(id, outbox));
        true
    }

    /// Forgets a session and returns its account.
    ///
    /// Dropping the returned account drops its outbox; once the character
    /// is gone too, the session's channels close.
    pub fn remove_account(&mut self, id: SessionId) -> Option<Account> {
        let account = self.accounts.remove(&id)?;
        info!(
            "Session {} left after {:.1}s",
            id,
            account.connected_at.elapsed().as_secs_f32()
        );
        Some(account)
    }

    /// Looks up a session by id.
    pub fn get(&self, id: SessionId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// Mutable lookup, used when a session picks its character name.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    /// A copy of the session's delivery handles.
    pub fn outbox(&self, id: SessionId) -> Option<Outbox> {
        self.accounts.get(&id).map(|account| account.outbox.clone())
    }

    /// Number of sessions that picked a character.
    pub fn in_world(&self) -> usize {
        self.accounts.values().filter(|a| a.in_world()).count()
    }

    /// Number of connected sessions, logged in or not.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// True when no session is connected.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox;

    fn outbox(id: SessionId) -> Outbox {
        mailbox::channel(id).0
    }

    #[test]
    fn test_account_manager_creation() {
        let manager = AccountManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_and_remove_account() {
        let mut manager = AccountManager::new(2);

        assert!(manager.add_account(1, outbox(1)));
        assert_eq!(manager.len(), 1);
        assert!(manager.get(1).is_some());
        assert!(!manager.get(1).unwrap().in_world());

        let removed = manager.remove_account(1).unwrap();
        assert_eq!(removed.id, 1);
        assert!(manager.is_empty());
        assert!(manager.remove_account(1).is_none());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut manager = AccountManager::new(1);

        assert!(manager.add_account(1, outbox(1)));
        assert!(!manager.add_account(2, outbox(2)));
        assert_eq!(manager.len(), 1);

        manager.remove_account(1);
        assert!(manager.add_account(2, outbox(2)));
    }

    #[test]
    fn test_outbox_lookup() {
        let mut manager = AccountManager::new(2);
        let (tx, mut rx) = mailbox::channel(3);
        manager.add_account(3, tx);

        manager.outbox(3).unwrap().broadcast("hi");
        assert_eq!(rx.broadcast.try_recv().unwrap(), "hi");
        assert!(manager.outbox(4).is_none());
    }

    #[test]
    fn test_in_world_count() {
        let mut manager = AccountManager::new(4);
        manager.add_account(1, outbox(1));
        manager.add_account(2, outbox(2));
        manager.get_mut(2).unwrap().character = Some("bella".to_string());

        assert_eq!(manager.in_world(), 1);
    }
}
