//! Client-side read-through caches over the task and list collections.
//!
//! Both caches are built on [`Collection`], which owns the entries and a
//! ticket sequence that keeps a slow fetch from overwriting the effect of a
//! newer request. Every fetch and every server-confirmed mutation takes a
//! [`Ticket`] before its request goes out:
//!
//! - a fetch result replaces the collection only if its ticket is newer
//!   than the last one applied, otherwise it is reported as
//!   [`FetchOutcome::Stale`] and dropped
//! - a confirmed mutation always splices its entity in and advances the
//!   applied ticket, which retires any fetch issued before it
//!
//! Local optimistic edits take no ticket.

pub mod lists;
pub mod tasks;

use std::fmt::Display;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use taskboard_proto::list::{ListId, TaskList};
use taskboard_proto::task::{Task, TaskId};

pub use lists::ListCache;
pub use tasks::TaskCache;

/// An entity with a stable identity.
pub trait Keyed {
    /// Identity type.
    type Key: Eq + Hash + Clone + Display;

    /// The entity's identity.
    fn key(&self) -> &Self::Key;
}

impl Keyed for Task {
    type Key = TaskId;

    fn key(&self) -> &TaskId {
        &self.id
    }
}

impl Keyed for TaskList {
    type Key = ListId;

    fn key(&self) -> &ListId {
        &self.id
    }
}

/// Position of a request in a collection's issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// What happened to a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The collection now holds exactly the fetched entries.
    Applied {
        /// Number of entries after de-duplication.
        count: usize,
    },
    /// A newer request had already been applied; the result was dropped.
    Stale,
}

impl FetchOutcome {
    /// Whether the result was applied.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug)]
struct Entries<T> {
    items: Vec<T>,
    applied: u64,
}

/// Ordered, id-unique collection with stale-response protection.
#[derive(Debug)]
pub struct Collection<T> {
    issued: AtomicU64,
    entries: RwLock<Entries<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            issued: AtomicU64::new(0),
            entries: RwLock::new(Entries {
                items: Vec::new(),
                applied: 0,
            }),
        }
    }
}

impl<T: Keyed + Clone> Collection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the next ticket. Call before the request is sent.
    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Replaces every entry with `items` unless `ticket` is stale.
    ///
    /// Duplicate ids in `items` keep their first occurrence.
    pub fn replace_all(&self, ticket: Ticket, items: Vec<T>) -> FetchOutcome {
        let mut entries = self.entries.write();
        if ticket.0 <= entries.applied {
            tracing::debug!(ticket = ticket.0, applied = entries.applied, "discarding stale fetch");
            return FetchOutcome::Stale;
        }

        let unique = dedup(items);
        let count = unique.len();
        entries.items = unique;
        entries.applied = ticket.0;
        FetchOutcome::Applied { count }
    }

    /// Replaces every entry with `items` even if `ticket` is stale.
    ///
    /// Used when the fetched state must win, such as a reload after the
    /// backend rejected an optimistic edit. Returns the entry count.
    pub fn force_replace_all(&self, ticket: Ticket, items: Vec<T>) -> usize {
        let mut entries = self.entries.write();
        let unique = dedup(items);
        let count = unique.len();
        entries.items = unique;
        entries.applied = entries.applied.max(ticket.0);
        count
    }

    /// Replaces the entry with `item`'s id, or appends it.
    ///
    /// Returns `true` if an existing entry was replaced.
    pub fn upsert(&self, ticket: Ticket, item: T) -> bool {
        let mut entries = self.entries.write();
        entries.applied = entries.applied.max(ticket.0);
        if let Some(slot) = entries.items.iter_mut().find(|e| e.key() == item.key()) {
            *slot = item;
            true
        } else {
            entries.items.push(item);
            false
        }
    }

    /// Replaces the entry with `item`'s id if one is cached.
    ///
    /// Returns `true` if an entry was replaced.
    pub fn replace_existing(&self, ticket: Ticket, item: T) -> bool {
        let mut entries = self.entries.write();
        entries.applied = entries.applied.max(ticket.0);
        match entries.items.iter_mut().find(|e| e.key() == item.key()) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Removes the entry with `key`, returning it.
    pub fn remove(&self, ticket: Ticket, key: &T::Key) -> Option<T> {
        let mut entries = self.entries.write();
        entries.applied = entries.applied.max(ticket.0);
        let index = entries.items.iter().position(|e| e.key() == key)?;
        Some(entries.items.remove(index))
    }

    /// Edits the entry with `key` in place, without a ticket.
    ///
    /// Returns `false` if no such entry is cached.
    pub fn modify(&self, key: &T::Key, edit: impl FnOnce(&mut T)) -> bool {
        let mut entries = self.entries.write();
        match entries.items.iter_mut().find(|e| e.key() == key) {
            Some(entry) => {
                edit(entry);
                true
            }
            None => false,
        }
    }

    /// Runs `rearrange` over the entries in place, without a ticket.
    ///
    /// The closure may permute entries but must not add or drop any.
    pub fn rearrange<R>(&self, rearrange: impl FnOnce(&mut [T]) -> R) -> R {
        rearrange(self.entries.write().items.as_mut_slice())
    }

    /// Clone of the entries in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().items.clone()
    }

    /// Clone of the entries matching `keep`, in order.
    #[must_use]
    pub fn filtered(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.entries
            .read()
            .items
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect()
    }

    /// Clone of the entry with `key`.
    #[must_use]
    pub fn get(&self, key: &T::Key) -> Option<T> {
        self.entries.read().items.iter().find(|e| e.key() == key).cloned()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().items.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().items.is_empty()
    }
}

/// Drops repeated ids, keeping the first occurrence.
fn dedup<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if unique.iter().any(|kept| kept.key() == item.key()) {
            tracing::warn!(id = %item.key(), "fetch returned duplicate id, keeping first");
            continue;
        }
        unique.push(item);
    }
    unique
}
