//! 🪣📡 Remote objects: `gs://bucket/object`, fetched over plain HTTPS.
//!
//! COLD OPEN. EXT. DATA CENTER, 3:47 AM
//!
//! The load test needed its targets. The targets lived in a bucket. The bucket
//! lived in a region nobody could remember. "Just stream it," someone said,
//! and the [`GcsOpener`] began pulling bytes at wire speed.
//!
//! 🧠 Knowledge graph:
//! - [`ObjectOpener`]: the abstract capability. `(cancel, bucket, object) → DataStream`.
//!   Swap it out in tests, or for another cloud, without touching the dispatch.
//! - [`GcsOpener`]: the JSON API media download,
//!   `GET {endpoint}/storage/v1/b/{bucket}/o/{object}?alt=media`.
//! - Transport: `reqwest` → `bytes_stream()` → `StreamReader` → `OwnedStream`, so
//!   releasing the stream hangs up the HTTP body.
//! - Credentials: an already-resolved bearer token from config, or none for public
//!   buckets and emulators. Figuring out WHICH token is somebody else's job.

use std::io;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Url;
use serde::Deserialize;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DataStream, OwnedStream};

/// 🚪 The remote fetch capability: given a bucket and an object, produce a readable stream.
///
/// Implementations must give up promptly when `cancel` fires.
#[async_trait]
pub trait ObjectOpener: Send + Sync + std::fmt::Debug {
    async fn open(
        &self,
        cancel: &CancellationToken,
        bucket: &str,
        object: &str,
    ) -> Result<DataStream>;
}

/// 🔧 Knobs for the GCS opener. Lives right next to the thing it configures.
#[derive(Deserialize, Clone)]
pub struct GcsConfig {
    /// 🌎 Base URL of the storage API. Point it at an emulator for local runs.
    #[serde(default = "default_gcs_endpoint")]
    pub endpoint: String,
    /// 🔒 Bearer token sent as-is. `None` for public buckets.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

fn default_gcs_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_gcs_endpoint(),
            bearer_token: None,
        }
    }
}

// 🔒 hand-rolled Debug so the token never lands in a log line
impl std::fmt::Debug for GcsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// 🪣 Streams objects out of Google Cloud Storage (or anything that speaks its JSON API).
#[derive(Debug, Clone)]
pub struct GcsOpener {
    client: reqwest::Client,
    config: GcsConfig,
}

impl GcsOpener {
    pub fn new(config: GcsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// 🗺️ Build the media download URL. Each path piece is percent-encoded on its own,
    /// so an object called `a/b.csv` travels as `a%2Fb.csv`.
    pub(crate) fn media_url(&self, bucket: &str, object: &str) -> Result<Url> {
        let mut the_url = Url::parse(&self.config.endpoint).with_context(|| {
            format!(
                "💀 GCS endpoint '{}' is not a URL we can work with",
                self.config.endpoint
            )
        })?;
        the_url
            .path_segments_mut()
            .map_err(|_| {
                anyhow!(
                    "💀 GCS endpoint '{}' cannot carry a path",
                    self.config.endpoint
                )
            })?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", object]);
        the_url.query_pairs_mut().append_pair("alt", "media");
        Ok(the_url)
    }
}

impl Default for GcsOpener {
    fn default() -> Self {
        Self::new(GcsConfig::default())
    }
}

#[async_trait]
impl ObjectOpener for GcsOpener {
    async fn open(
        &self,
        cancel: &CancellationToken,
        bucket: &str,
        object: &str,
    ) -> Result<DataStream> {
        let the_url = self.media_url(bucket, object)?;
        debug!("📡 GET {}", the_url);

        let mut the_request = self.client.get(the_url);
        if let Some(token) = &self.config.bearer_token {
            the_request = the_request.bearer_auth(token);
        }

        // -- 🏁 whoever finishes first: the cancel token or the bucket
        let the_response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                bail!("🛑 Fetch of gs://{}/{} was cancelled before it finished", bucket, object);
            }
            response = the_request.send() => response.with_context(|| {
                format!("💀 Request for gs://{}/{} never made it to the bucket", bucket, object)
            })?,
        };

        let the_status = the_response.status();
        if !the_status.is_success() {
            bail!(
                "💀 gs://{}/{} answered with HTTP {}. Wrong name, wrong token, or wrong bucket.",
                bucket,
                object,
                the_status
            );
        }

        // 🔗 ByteStream → AsyncRead. Boxed + pinned so the reader is Unpin.
        let the_body = Box::pin(the_response.bytes_stream().map_err(io::Error::other));
        Ok(DataStream::Owned(Box::new(OwnedStream::new(
            StreamReader::new(the_body),
        ))))
    }
}
