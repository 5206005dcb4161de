//! Integration tests for the sync service: fetching through a mock remote
//! source, merge updates, and feed state transitions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use rolo::error::Error;
use rolo::feed::{FeedState, Feeds};
use rolo::model::{ContactRecord, PageInfo, RemoteContact, RemoteId, RemoteName, RemotePage};
use rolo::remote::RemoteSource;
use rolo::service::SyncService;
use rolo::store::ContactStore;

// =============================================================================
// Test Helpers
// =============================================================================

/// Store plus service over a database in its own temp directory. The
/// directory handle must stay alive for the duration of the test.
fn open_service() -> (TempDir, Arc<ContactStore>, SyncService) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ContactStore::open(&dir.path().join("contacts.db")).unwrap());
    let service = SyncService::new(store.clone());
    (dir, store, service)
}

fn profile(first: &str, last: &str, email: &str) -> RemoteContact {
    RemoteContact {
        gender: Some("female".into()),
        name: Some(RemoteName {
            title: Some("Ms".into()),
            first: Some(first.into()),
            last: Some(last.into()),
        }),
        email: Some(email.into()),
        phone: Some("031-541-9181".into()),
        cell: Some("081-647-4650".into()),
        id: Some(RemoteId {
            name: Some("CPR".into()),
            value: None,
        }),
        picture: None,
    }
}

fn page(seed: &str, page_no: u32, results: Vec<RemoteContact>) -> RemotePage {
    RemotePage {
        results,
        info: PageInfo {
            seed: seed.into(),
            results: 25,
            page: page_no,
            version: "1.4".into(),
        },
    }
}

/// Serves the same page on every call.
struct StaticRemote {
    page: RemotePage,
}

impl RemoteSource for StaticRemote {
    async fn fetch_page(&self) -> rolo::Result<RemotePage> {
        Ok(self.page.clone())
    }
}

/// Serves queued pages in order, then errors.
struct QueueRemote {
    pages: Mutex<VecDeque<RemotePage>>,
}

impl QueueRemote {
    fn new(pages: Vec<RemotePage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
        }
    }
}

impl RemoteSource for QueueRemote {
    async fn fetch_page(&self) -> rolo::Result<RemotePage> {
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::network("no pages queued"))
    }
}

/// Always fails, as an unreachable endpoint would.
struct FailingRemote;

impl RemoteSource for FailingRemote {
    async fn fetch_page(&self) -> rolo::Result<RemotePage> {
        Err(Error::network("connection refused"))
    }
}

// =============================================================================
// Fetch Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_and_cache_stores_page_with_provenance() {
    let (_dir, store, service) = open_service();
    let remote = StaticRemote {
        page: page("feedface", 3, vec![
            profile("Jennie", "Nichols", "jennie.nichols@example.com"),
            profile("Ida", "Kristensen", "ida.kristensen@example.com"),
        ]),
    };

    let cached = service.fetch_and_cache(&remote).await.unwrap();
    assert_eq!(cached, 2);

    let mut records = store.get_all().unwrap();
    records.sort_by_key(|r| r.id);
    assert_eq!(records.len(), 2);

    for record in &records {
        assert!(record.id.is_some());
        assert_eq!(record.source_seed.as_deref(), Some("feedface"));
        assert_eq!(record.source_page, Some(3));
        assert_eq!(record.source_results, Some(25));
        assert_eq!(record.source_version.as_deref(), Some("1.4"));
        // A null identifier value stays null; the scheme name is kept.
        assert_eq!(record.external_id_name.as_deref(), Some("CPR"));
        assert_eq!(record.external_id_value, None);
    }
    assert_eq!(records[0].first_name.as_deref(), Some("Jennie"));
    assert_eq!(records[1].first_name.as_deref(), Some("Ida"));
}

#[tokio::test]
async fn test_fetch_twice_appends_both_batches() {
    let (_dir, store, service) = open_service();
    let remote = QueueRemote::new(vec![
        page("aaaa", 1, vec![profile("Ada", "Lovelace", "ada@example.com")]),
        page("bbbb", 1, vec![profile("Grace", "Hopper", "grace@example.com")]),
    ]);

    assert_eq!(service.fetch_and_cache(&remote).await.unwrap(), 1);
    assert_eq!(service.fetch_and_cache(&remote).await.unwrap(), 1);

    let mut records = store.get_all().unwrap();
    records.sort_by_key(|r| r.id);
    assert_eq!(records.len(), 2);
    // Ids keep increasing across batches.
    assert!(records[0].id.unwrap() < records[1].id.unwrap());
    assert_eq!(records[0].source_seed.as_deref(), Some("aaaa"));
    assert_eq!(records[1].source_seed.as_deref(), Some("bbbb"));
}

#[tokio::test]
async fn test_concurrent_fetches_both_land() {
    let (_dir, store, service) = open_service();
    let service = Arc::new(service);
    let remote = Arc::new(QueueRemote::new(vec![
        page("aaaa", 1, vec![
            profile("Ada", "Lovelace", "ada@example.com"),
            profile("Grace", "Hopper", "grace@example.com"),
        ]),
        page("bbbb", 1, vec![
            profile("Edith", "Clarke", "edith@example.com"),
            profile("Hedy", "Lamarr", "hedy@example.com"),
        ]),
    ]));

    let first = tokio::spawn({
        let service = service.clone();
        let remote = remote.clone();
        async move { service.fetch_and_cache(&*remote).await }
    });
    let second = tokio::spawn({
        let service = service.clone();
        let remote = remote.clone();
        async move { service.fetch_and_cache(&*remote).await }
    });

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first + second, 4);
    assert_eq!(store.count().unwrap(), 4);
}

// =============================================================================
// Read and Edit Tests
// =============================================================================

#[test]
fn test_contact_by_id_absent_is_none() {
    let (_dir, _store, service) = open_service();
    assert_eq!(service.contact_by_id(12).unwrap(), None);
}

#[test]
fn test_search_cached_projects_summaries() {
    let (_dir, _store, service) = open_service();
    service
        .insert_new(&ContactRecord {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            ..ContactRecord::default()
        })
        .unwrap();
    service
        .insert_new(&ContactRecord {
            first_name: Some("Grace".into()),
            last_name: Some("Hopper".into()),
            ..ContactRecord::default()
        })
        .unwrap();

    let all = service.cached_contacts().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].display_name(), "Ada Lovelace");

    let hits = service.search_cached(Some("hopper")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].display_name(), "Grace Hopper");
}

#[test]
fn test_merge_update_overrides_only_set_fields() {
    let (_dir, _store, service) = open_service();
    let stored = service
        .insert_new(&ContactRecord {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@old.example.com".into()),
            phone: Some("555-0100".into()),
            ..ContactRecord::default()
        })
        .unwrap();
    let id = stored.id.unwrap();

    let merged = service
        .merge_update(&ContactRecord {
            id: Some(id),
            email: Some("ada@new.example.com".into()),
            ..ContactRecord::default()
        })
        .unwrap();

    assert_eq!(merged.email.as_deref(), Some("ada@new.example.com"));
    assert_eq!(merged.first_name.as_deref(), Some("Ada"));
    assert_eq!(merged.last_name.as_deref(), Some("Lovelace"));
    assert_eq!(merged.phone.as_deref(), Some("555-0100"));

    // The merge is durable, not just returned.
    assert_eq!(service.contact_by_id(id).unwrap(), Some(merged));
}

#[test]
fn test_merge_update_without_id_is_rejected() {
    let (_dir, store, service) = open_service();
    service
        .insert_new(&ContactRecord {
            first_name: Some("Ada".into()),
            ..ContactRecord::default()
        })
        .unwrap();
    let before = store.get_all().unwrap();

    let err = service
        .merge_update(&ContactRecord {
            first_name: Some("Grace".into()),
            ..ContactRecord::default()
        })
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(store.get_all().unwrap(), before);
}

#[test]
fn test_merge_update_unknown_id_is_not_found() {
    let (_dir, store, service) = open_service();
    let err = service
        .merge_update(&ContactRecord {
            id: Some(77),
            first_name: Some("Grace".into()),
            ..ContactRecord::default()
        })
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(77)));
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_insert_new_rejects_preassigned_id() {
    let (_dir, _store, service) = open_service();
    let err = service
        .insert_new(&ContactRecord {
            id: Some(5),
            first_name: Some("Ada".into()),
            ..ContactRecord::default()
        })
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

// =============================================================================
// Feed Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_through_feed_reaches_success_with_listing() {
    let (_dir, _store, service) = open_service();
    let feeds = Feeds::new();
    let remote = StaticRemote {
        page: page("feedface", 1, vec![
            profile("Ada", "Lovelace", "ada@example.com"),
            profile("Grace", "Hopper", "grace@example.com"),
        ]),
    };

    let outcome = feeds
        .cached
        .run(async {
            service.fetch_and_cache(&remote).await?;
            service.search_cached(None)
        })
        .await;

    let summaries = outcome.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(feeds.cached.current(), FeedState::Success(summaries));
}

#[tokio::test]
async fn test_failed_fetch_surfaces_as_feed_error_and_leaves_store_untouched() {
    let (_dir, store, service) = open_service();
    let feeds = Feeds::new();

    let outcome = feeds
        .cached
        .run(async {
            service.fetch_and_cache(&FailingRemote).await?;
            service.search_cached(None)
        })
        .await;

    assert_eq!(outcome, None);
    assert_eq!(
        feeds.cached.current(),
        FeedState::Error("network error: connection refused".into())
    );
    assert_eq!(store.count().unwrap(), 0);

    // The feed is not terminal: the next run starts over from Loading.
    let outcome = feeds
        .cached
        .run(async { service.search_cached(None) })
        .await;
    assert_eq!(outcome, Some(Vec::new()));
    assert_eq!(feeds.cached.current(), FeedState::Success(Vec::new()));
}
