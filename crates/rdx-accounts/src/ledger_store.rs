//! Append-only ledger store.
//!
//! Entries are indexed by id and by owner (in append order). Once written,
//! an entry can only change status along the pending → terminal edge; it is
//! never edited otherwise and never removed, apart from the administrative
//! [`LedgerStore::purge`] and rollback of an uncommitted unit of work.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rdx_types::{
    Asset, EntryFilter, EntryId, EntryStatus, LedgerEntry, Page, Paged, RdxError, Result, UserId,
};
use rust_decimal::Decimal;

/// In-memory ledger.
#[derive(Debug, Default, Clone)]
pub struct LedgerStore {
    entries: HashMap<EntryId, LedgerEntry>,
    /// Per-user entry ids in append order (oldest first).
    by_user: HashMap<UserId, Vec<EntryId>>,
}

impl LedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    ///
    /// # Errors
    /// Returns `DuplicateEntry` if an entry with the same id exists.
    pub fn append(&mut self, entry: LedgerEntry) -> Result<EntryId> {
        let id = entry.id;
        if self.entries.contains_key(&id) {
            return Err(RdxError::DuplicateEntry(id));
        }
        self.by_user.entry(entry.user_id).or_default().push(id);
        self.entries.insert(id, entry);
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&LedgerEntry> {
        self.entries.get(&id)
    }

    /// Entries for `user` that pass `filter`, newest first, paginated.
    #[must_use]
    pub fn list_for_user(&self, user: UserId, filter: &EntryFilter, page: Page) -> Paged<LedgerEntry> {
        let matching: Vec<&LedgerEntry> = self
            .entries_for(user)
            .rev()
            .filter(|e| e.matches(filter))
            .collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        Paged { items, total, page }
    }

    /// Move an entry out of `pending`. Returns the updated entry.
    ///
    /// # Errors
    /// - `EntryNotFound` if the id is unknown
    /// - `InvalidTransition` if the entry is already terminal
    pub fn update_status(&mut self, id: EntryId, status: EntryStatus) -> Result<&LedgerEntry> {
        let entry = self.entries.get_mut(&id).ok_or(RdxError::EntryNotFound(id))?;
        entry.mark_status(status, Utc::now())?;
        Ok(entry)
    }

    /// Σ `balance_delta` of completed entries per asset for `user`.
    ///
    /// # Errors
    /// Returns `Internal` if a running sum overflows.
    pub fn completed_deltas(&self, user: UserId) -> Result<BTreeMap<Asset, Decimal>> {
        let mut sums: BTreeMap<Asset, Decimal> = BTreeMap::new();
        for entry in self.entries_for(user).filter(|e| e.is_completed()) {
            let sum = sums.entry(entry.asset.clone()).or_default();
            *sum = sum.checked_add(entry.balance_delta()).ok_or_else(|| {
                RdxError::Internal(format!("{} ledger sum overflowed for {user}", entry.asset))
            })?;
        }
        Ok(sums)
    }

    /// Number of entries in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Administrative purge. Removes everything.
    pub fn purge(&mut self) {
        self.entries.clear();
        self.by_user.clear();
    }

    /// Remove an entry appended by a unit of work that is rolling back.
    pub(crate) fn discard(&mut self, id: EntryId) {
        if let Some(entry) = self.entries.remove(&id) {
            if let Some(ids) = self.by_user.get_mut(&entry.user_id) {
                if let Some(pos) = ids.iter().rposition(|e| *e == id) {
                    ids.remove(pos);
                }
            }
        }
    }

    /// Put back an entry as it was before a rolled-back status change.
    pub(crate) fn restore(&mut self, entry: LedgerEntry) {
        self.entries.insert(entry.id, entry);
    }

    /// Entries owned by `user`, oldest first.
    pub fn entries_for(&self, user: UserId) -> impl DoubleEndedIterator<Item = &LedgerEntry> {
        self.by_user
            .get(&user)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(id))
    }
}
