//! Observable operation state.
//!
//! A [`Feed`] tracks the lifecycle of the latest operation driven through
//! it: `None` until something runs, then `Loading`, then `Success` or
//! `Error(message)`. There is no terminal state; a feed is restarted by
//! simply running the next operation. Errors stop here: [`Feed::run`]
//! absorbs the typed error into the state, so watchers render a message
//! instead of unwinding.

use std::future::Future;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::warn;

use crate::error::Result;
use crate::model::{ContactRecord, ContactSummary, DeviceContact};

/// Lifecycle of the latest operation on one feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedState<T> {
    /// Nothing has run on this feed yet.
    None,
    Loading,
    Success(T),
    Error(String),
}

/// A restartable state feed over a watch channel. Cheap to observe: every
/// subscriber sees the latest state immediately and each change at most
/// once.
pub struct Feed<T> {
    tx: watch::Sender<FeedState<T>>,
}

impl<T: Clone + PartialEq> Feed<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FeedState::None);
        Self { tx }
    }

    /// The state as of now.
    pub fn current(&self) -> FeedState<T> {
        self.tx.borrow().clone()
    }

    /// A receiver positioned at the current state.
    pub fn subscribe(&self) -> watch::Receiver<FeedState<T>> {
        self.tx.subscribe()
    }

    /// The state sequence as a stream; the first item is the current state.
    pub fn stream(&self) -> WatchStream<FeedState<T>>
    where
        T: Send + Sync + 'static,
    {
        WatchStream::new(self.tx.subscribe())
    }

    /// Move the feed to `state`. A state equal to the current one is
    /// dropped without waking subscribers.
    pub fn set(&self, state: FeedState<T>) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Drive one operation through the feed: `Loading` while it runs, then
    /// `Success` with its value or `Error` with its message. Returns the
    /// value so non-observing callers can use it directly.
    pub async fn run<F>(&self, op: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.set(FeedState::Loading);
        match op.await {
            Ok(value) => {
                self.set(FeedState::Success(value.clone()));
                Some(value)
            }
            Err(err) => {
                warn!(error = %err, "feed operation failed");
                self.set(FeedState::Error(err.to_string()));
                None
            }
        }
    }
}

impl<T: Clone + PartialEq> Default for Feed<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The standing feeds a frontend observes: the cached-contact listing, the
/// device-contact listing, and the outcome of the latest edit.
#[derive(Default)]
pub struct Feeds {
    pub cached: Feed<Vec<ContactSummary>>,
    pub device: Feed<Vec<DeviceContact>>,
    pub edits: Feed<ContactRecord>,
}

impl Feeds {
    pub fn new() -> Self {
        Self::default()
    }
}
