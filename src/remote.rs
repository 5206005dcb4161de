//! Remote contact source: the trait the sync service consumes, and the
//! HTTP client for randomuser-style profile endpoints.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::RemotePage;

/// Profiles requested per page.
pub const PAGE_SIZE: u32 = 25;

/// Field groups requested from the endpoint; everything else is omitted
/// from the payload.
const INCLUDE_FIELDS: &str = "gender,name,picture,phone,cell,id,email";

/// A source of contact profile pages.
///
/// Fetching is lazy: nothing happens until `fetch_page` is awaited, and
/// every call is an independent request. Implementations report transport
/// problems as network errors and reachable-but-unusable answers as
/// response errors.
#[allow(async_fn_in_trait)]
pub trait RemoteSource {
    /// Fetch one page of profiles.
    async fn fetch_page(&self) -> Result<RemotePage>;
}

/// HTTP client for a randomuser-style endpoint.
pub struct RandomUserClient {
    client: reqwest::Client,
    url: String,
}

impl RandomUserClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::network(format!("build http client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl RemoteSource for RandomUserClient {
    async fn fetch_page(&self) -> Result<RemotePage> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("results", PAGE_SIZE)])
            .query(&[("inc", INCLUDE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::network(format!("request to {}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::response(format!(
                "{} answered {}",
                self.url, status
            )));
        }

        let page: RemotePage = response
            .json()
            .await
            .map_err(|e| Error::response(format!("decode profile page: {}", e)))?;

        debug!(
            results = page.results.len(),
            page = page.info.page,
            seed = %page.info.seed,
            "fetched profile page"
        );
        Ok(page)
    }
}
