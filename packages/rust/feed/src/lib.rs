//! Feed fetching for skywatch.
//!
//! [`FeedClient`] downloads the channel's Atom/RSS mirror over HTTPS and hands
//! the document to [`parser`] for entry extraction. The client is the only
//! place in the workspace that talks to the network.

pub mod parser;

use std::time::Duration;

use tracing::{debug, instrument};
use url::Url;

use skywatch_shared::{FeedConfig, Result, SkywatchError};

pub use parser::{FeedItem, parse_feed_items};

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("skywatch/", env!("CARGO_PKG_VERSION"));

/// HTTP client for polling the feed.
pub struct FeedClient {
    client: reqwest::Client,
    limit: usize,
}

impl FeedClient {
    /// Create a new client with the given configuration.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SkywatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            limit: config.limit,
        })
    }

    /// Fetch the feed at `url` and return its entries, oldest first.
    ///
    /// Keeps at most the configured number of newest entries. A non-2xx
    /// response or an unparseable document is an error; malformed individual
    /// entries are skipped by the parser.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<Vec<FeedItem>> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| SkywatchError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SkywatchError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SkywatchError::Network(format!("{url}: body read failed: {e}")))?;

        debug!(bytes = body.len(), "feed downloaded");

        parse_feed_items(&body, self.limit)
    }
}
