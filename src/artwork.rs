use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::KeeperError;
use crate::models::Artwork;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Asynchronous artwork source. Completion order is not guaranteed; callers
/// must be prepared for a result to arrive after it stopped mattering.
pub trait ArtworkLoader: Send + Sync {
    fn fetch(&self, url: &str, size_px: u32) -> BoxFuture<'static, Result<Artwork, KeeperError>>;
}

/// Downloads artwork over HTTP and hands the raw bytes to the surface, which
/// does the decoding and the center-crop to `size_px`.
pub struct HttpArtworkLoader {
    client: Arc<Client>,
}

impl HttpArtworkLoader {
    pub fn new(custom_client: Option<Arc<Client>>) -> Result<Self, KeeperError> {
        let client = match custom_client {
            Some(client) => client,
            None => Arc::new(
                Client::builder()
                    .pool_idle_timeout(Some(Duration::from_secs(90)))
                    .timeout(REQUEST_TIMEOUT)
                    .connect_timeout(REQUEST_TIMEOUT)
                    .build()?,
            ),
        };
        Ok(Self { client })
    }
}

impl ArtworkLoader for HttpArtworkLoader {
    fn fetch(&self, url: &str, size_px: u32) -> BoxFuture<'static, Result<Artwork, KeeperError>> {
        let client = self.client.clone();
        let url = url.to_string();
        async move {
            debug!(%url, size_px, "Fetching artwork");
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(KeeperError::Artwork(format!(
                    "{} returned {}",
                    url,
                    response.status()
                )));
            }
            let data = response.bytes().await?;
            Ok(Artwork { url, size_px, data })
        }
        .boxed()
    }
}
