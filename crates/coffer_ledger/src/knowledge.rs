//! # Item Knowledge
//!
//! An account may only pull an item out of the pool once someone in the pool
//! has "learned" it, which normally happens the first time the item is fed
//! in. The record of who knows what belongs to an external collaborator.

use std::collections::{BTreeSet, HashMap};

use crate::account::AccountId;
use crate::key::ItemId;

/// External record of which items each account has unlocked.
pub trait KnowledgeBook: Send {
    /// Returns true if `account` has unlocked `item`.
    fn has_knowledge(&self, account: AccountId, item: ItemId) -> bool;

    /// Unlocks `item` for `account`.
    fn add_knowledge(&mut self, account: AccountId, item: ItemId);

    /// Every item `account` has unlocked.
    fn known_items(&self, account: AccountId) -> Vec<ItemId>;
}

/// In-memory knowledge record.
#[derive(Clone, Debug, Default)]
pub struct MemoryKnowledge {
    known: HashMap<AccountId, BTreeSet<ItemId>>,
}

impl MemoryKnowledge {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KnowledgeBook for MemoryKnowledge {
    fn has_knowledge(&self, account: AccountId, item: ItemId) -> bool {
        self.known
            .get(&account)
            .is_some_and(|items| items.contains(&item))
    }

    fn add_knowledge(&mut self, account: AccountId, item: ItemId) {
        self.known.entry(account).or_default().insert(item);
    }

    fn known_items(&self, account: AccountId) -> Vec<ItemId> {
        self.known
            .get(&account)
            .map(|items| items.iter().copied().collect())
            .unwrap_or_default()
    }
}
