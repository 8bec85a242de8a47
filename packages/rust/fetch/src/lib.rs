//! Document retrieval from the external document store.
//!
//! Each attached document is referenced by identifier only; bytes are
//! fetched on demand with one HTTP GET per identifier. This crate performs
//! no retries; retry policy, if any, belongs to the caller. Failures carry
//! the document identifier and the underlying status or transport reason so
//! the merge engine can render a meaningful error page.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use orderpack_shared::{OrderpackError, Result};

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("orderpack/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects to follow when fetching a document.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Client for the document store's byte-retrieval endpoint.
pub struct DocumentStore {
    base_url: Url,
    client: Client,
}

impl DocumentStore {
    /// Create a store client for the given base URL.
    pub fn new(base_url: Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                OrderpackError::config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { base_url, client })
    }

    /// Resolve the retrieval URL for a document identifier:
    /// `{base}/documents/{id}`.
    pub fn document_url(&self, document_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                OrderpackError::validation(format!(
                    "store base URL '{}' cannot be a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["documents", document_id]);
        Ok(url)
    }

    /// Fetch the raw bytes of one document.
    ///
    /// Fails with [`OrderpackError::Fetch`] on transport errors or any
    /// non-success status; the message names the identifier and the reason.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn fetch(&self, document_id: &str) -> Result<Vec<u8>> {
        let url = self.document_url(document_id).map_err(|e| {
            OrderpackError::fetch(document_id, e.to_string())
        })?;

        debug!(%url, "fetching document");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| OrderpackError::fetch(document_id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrderpackError::fetch(document_id, format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OrderpackError::fetch(document_id, format!("body read failed: {e}")))?;

        debug!(len = bytes.len(), "document fetched");
        Ok(bytes.to_vec())
    }
}
