//! Cover consumer (spec §4.3.2): fetch, normalize, and park cover art at its
//! canonical storage key, then point the edition row at CDN URLs. Grounded
//! on `aws_s3::storage`'s `Client`/`put_object`/`head_object` shape (pack
//! repo `get-convex-convex-backend`) — the only object-storage client
//! anywhere in the retrieval pack.
//!
//! No image-decoding/resizing crate appears anywhere in the pack, so the
//! "decode, resize, re-encode" step is represented as a `CoverProcessor`
//! seam rather than invented wholesale: `PassthroughCoverProcessor` uploads
//! the provider's bytes unchanged, which is honest about what this
//! transformation actually is here (documented as a DESIGN.md simplification
//! rather than faked out with a fabricated dependency).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use alexandria_merge::EnrichmentWriter;
use alexandria_providers::{MetadataProvider, ProviderRegistry};

use crate::error::{ConsumerError, Disposition, Result};
use crate::messages::CoverMessage;

/// Transforms raw provider cover bytes into the form actually stored. A real
/// deployment would decode/resize/re-encode here; this codebase's pack has
/// no image crate to ground that step on, so the default just forwards the
/// bytes and extension untouched.
#[async_trait]
pub trait CoverProcessor: Send + Sync {
    async fn process(&self, bytes: bytes::Bytes, content_type: &str) -> Result<(bytes::Bytes, &'static str)>;
}

pub struct PassthroughCoverProcessor;

#[async_trait]
impl CoverProcessor for PassthroughCoverProcessor {
    async fn process(&self, bytes: bytes::Bytes, content_type: &str) -> Result<(bytes::Bytes, &'static str)> {
        let ext = if content_type.contains("png") { "png" } else { "jpg" };
        Ok((bytes, ext))
    }
}

pub struct CoverConsumer {
    registry: std::sync::Arc<ProviderRegistry>,
    writer: std::sync::Arc<dyn EnrichmentWriter>,
    processor: std::sync::Arc<dyn CoverProcessor>,
    http: reqwest::Client,
    s3: S3Client,
    bucket: String,
    cdn_base_url: String,
}

impl CoverConsumer {
    pub fn new(
        registry: std::sync::Arc<ProviderRegistry>,
        writer: std::sync::Arc<dyn EnrichmentWriter>,
        processor: std::sync::Arc<dyn CoverProcessor>,
        http: reqwest::Client,
        s3: S3Client,
        bucket: String,
        cdn_base_url: String,
    ) -> Self {
        Self {
            registry,
            writer,
            processor,
            http,
            s3,
            bucket,
            cdn_base_url,
        }
    }

    fn storage_key(isbn: &str, ext: &str) -> String {
        format!("isbn/{isbn}/original.{ext}")
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        match self.s3.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => match err.into_service_error() {
                service_err if service_err.is_not_found() => Ok(false),
                service_err => Err(ConsumerError::Storage(format!("head_object failed: {service_err}"))),
            },
        }
    }

    /// Processes one `cover-queue` message (spec §4.3.2 steps a-e).
    pub async fn process_message(&self, message: &CoverMessage) -> Disposition {
        match self.try_process(message).await {
            Ok(()) => Disposition::Ack,
            Err(ConsumerError::Poison(reason)) => {
                tracing::warn!(isbn = message.isbn, reason, "poison cover message, acking without retry");
                Disposition::Ack
            }
            Err(err) => {
                tracing::error!(isbn = message.isbn, error = %err, "cover consumer failed, will retry");
                Disposition::Retry
            }
        }
    }

    async fn try_process(&self, message: &CoverMessage) -> Result<()> {
        let probe_key = Self::storage_key(&message.isbn, "jpg");
        if self.object_exists(&probe_key).await.unwrap_or(false) {
            return Ok(());
        }

        let mut provider_url = message.provider_url.clone();
        if provider_url.is_none() {
            provider_url = self.ask_cover_orchestrator(&message.isbn).await?;
        }
        let Some(url) = provider_url else {
            return Ok(());
        };

        let (bytes, content_type) = match self.download(&url).await {
            Ok(downloaded) => downloaded,
            Err(DownloadError::AuthExpired) => {
                // JWT recovery: refetch a fresh provider URL and retry exactly once.
                let refreshed = self
                    .ask_cover_orchestrator(&message.isbn)
                    .await?
                    .ok_or_else(|| ConsumerError::Storage("no fresh cover url after JWT recovery".to_string()))?;
                self.download(&refreshed)
                    .await
                    .map_err(|_| ConsumerError::Storage("cover download failed after JWT recovery retry".to_string()))?
            }
            Err(DownloadError::Other(err)) => return Err(err),
        };

        let (processed, ext) = self.processor.process(bytes, &content_type).await?;
        let key = Self::storage_key(&message.isbn, ext);

        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(processed.to_vec()))
            .content_type(format!("image/{ext}"))
            .send()
            .await
            .map_err(|err| ConsumerError::Storage(format!("put_object failed: {err}")))?;

        let cdn_url = format!("{}/{}", self.cdn_base_url.trim_end_matches('/'), key);
        self.writer.set_cover(&message.isbn, &cdn_url, "alexandria-r2").await?;

        Ok(())
    }

    async fn ask_cover_orchestrator(&self, isbn: &str) -> Result<Option<String>> {
        let Some(isbndb) = self.registry.by_name("isbndb") else {
            return Ok(None);
        };
        let record = isbndb.fetch_metadata(isbn).await?;
        Ok(record.and_then(|r| r.cover.best().map(str::to_string)))
    }

    async fn download(&self, url: &str) -> std::result::Result<(bytes::Bytes, String), DownloadError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| DownloadError::Other(ConsumerError::Storage(err.to_string())))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(DownloadError::AuthExpired);
        }
        let response = response
            .error_for_status()
            .map_err(|err| DownloadError::Other(ConsumerError::Storage(err.to_string())))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|err| DownloadError::Other(ConsumerError::Storage(err.to_string())))?;

        Ok((bytes, content_type))
    }
}

enum DownloadError {
    AuthExpired,
    Other(ConsumerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_isbn_keyed() {
        assert_eq!(CoverConsumer::storage_key("9780439064873", "jpg"), "isbn/9780439064873/original.jpg");
    }

    #[tokio::test]
    async fn passthrough_processor_picks_extension_from_content_type() {
        let processor = PassthroughCoverProcessor;
        let (_, ext) = processor.process(bytes::Bytes::from_static(b"data"), "image/png").await.unwrap();
        assert_eq!(ext, "png");
        let (_, ext) = processor.process(bytes::Bytes::from_static(b"data"), "image/jpeg").await.unwrap();
        assert_eq!(ext, "jpg");
    }
}
