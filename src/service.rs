//! Synchronization service: orchestrates the remote profile source and the
//! local record store.
//!
//! Every operation returns a typed `Result`; nothing is swallowed here.
//! Callers that want the lifecycle as observable state run these through a
//! [`crate::feed::Feed`], which is where errors become screen messages.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{ContactRecord, ContactSummary};
use crate::remote::RemoteSource;
use crate::store::ContactStore;

/// Sync and read/edit operations over one shared [`ContactStore`].
pub struct SyncService {
    store: Arc<ContactStore>,
}

impl SyncService {
    pub fn new(store: Arc<ContactStore>) -> Self {
        Self { store }
    }

    /// Fetch one page of profiles and cache all of them in a single batch.
    /// Returns how many records the page carried. Each call is an
    /// independent fetch; concurrent calls are not coalesced, both batches
    /// land.
    pub async fn fetch_and_cache<R: RemoteSource>(&self, remote: &R) -> Result<usize> {
        let page = remote.fetch_page().await?;
        let records: Vec<ContactRecord> = page
            .results
            .iter()
            .map(|profile| ContactRecord::from_remote(profile, &page.info))
            .collect();
        self.store.upsert_many(&records)?;
        info!(
            cached = records.len(),
            page = page.info.page,
            seed = %page.info.seed,
            "cached remote page"
        );
        Ok(records.len())
    }

    /// Name-ordered summaries of every cached contact.
    pub fn cached_contacts(&self) -> Result<Vec<ContactSummary>> {
        self.search_cached(None)
    }

    /// Like [`Self::cached_contacts`], filtered by a case-insensitive
    /// substring over first and last name.
    pub fn search_cached(&self, filter: Option<&str>) -> Result<Vec<ContactSummary>> {
        let records = self.store.list(filter)?;
        Ok(records.iter().filter_map(|r| r.summary()).collect())
    }

    /// One cached contact in full. Absence is not an error.
    pub fn contact_by_id(&self, id: i64) -> Result<Option<ContactRecord>> {
        self.store.get_by_id(id)
    }

    /// Merge a partial edit onto the stored contact carrying `partial.id`.
    ///
    /// Of the editable fields (first name, last name, email, phone) only
    /// those set on `partial` replace stored values; everything else keeps
    /// its stored value. A partial without an id, or with an id nothing is
    /// stored under, is rejected and the store stays untouched.
    pub fn merge_update(&self, partial: &ContactRecord) -> Result<ContactRecord> {
        let id = partial
            .id
            .ok_or_else(|| Error::validation("update needs the id of a stored contact"))?;
        let existing = self.store.get_by_id(id)?.ok_or(Error::NotFound(id))?;
        let merged = existing.apply_partial(partial);
        self.store.update_one(&merged)?;
        debug!(id, "merged contact update");
        Ok(merged)
    }

    /// Persist a locally created contact as a new record. The store assigns
    /// the id; the input must not carry one.
    pub fn insert_new(&self, record: &ContactRecord) -> Result<ContactRecord> {
        if record.id.is_some() {
            return Err(Error::validation("a new contact must not carry an id"));
        }
        let stored = self.store.insert(record)?;
        debug!(id = ?stored.id, "inserted new contact");
        Ok(stored)
    }
}
