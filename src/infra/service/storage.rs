use std::{collections::HashMap, path::Path, time::Duration};

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use percent_encoding::percent_decode_str;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::{
    domain::{
        datatype::media::MAX_UPLOAD_SIZE,
        service::{ByteChunks, ObjectStorage},
    },
    error::service::{ServiceError, ServiceKind, UploadError},
};

/// Multipart upload part size, 8 MiB.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// Lifetime of presigned access URLs, 7 days.
pub const PRESIGN_EXPIRATION: Duration = Duration::from_secs(7 * 24 * 3600);

fn storage_error(err: impl std::error::Error) -> ServiceError {
    ServiceError::new(ServiceKind::Storage, DisplayErrorContext(err).to_string())
}

/// Cuts a received body into multipart upload parts, failing as soon as `limit` is exceeded.
pub struct PartBuffer {
    part_size: usize,
    limit: u64,
    total: u64,
    buf: BytesMut,
}

impl PartBuffer {
    pub fn new(part_size: usize, limit: u64) -> Self {
        Self {
            part_size,
            limit,
            total: 0,
            buf: BytesMut::with_capacity(part_size),
        }
    }

    /// Buffers `bytes`, returning the parts completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Bytes>, UploadError> {
        self.total += bytes.len() as u64;
        if self.total > self.limit {
            return Err(UploadError::TooLarge { limit: self.limit });
        }

        self.buf.extend_from_slice(bytes);
        let mut parts = Vec::new();
        while self.buf.len() >= self.part_size {
            parts.push(self.buf.split_to(self.part_size).freeze());
        }
        Ok(parts)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes left after the last complete part.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Key of an object of `bucket` addressed by `url`.
///
/// Public URLs are resolved against `public_url`. Presigned URLs carry the key as their
/// path, after the bucket segment when the URL is path style.
pub fn object_key(public_url: Option<&str>, bucket: &str, url: &str) -> Option<String> {
    if let Some(public) = public_url {
        if let Some(rest) = url.strip_prefix(&format!("{public}/")) {
            let path = rest.split(['?', '#']).next().unwrap_or_default();
            return decode_segment(path).filter(|key| !key.is_empty());
        }
    }

    let parsed = Url::parse(url).ok()?;
    parsed.query()?;
    let mut segments = parsed.path_segments()?.peekable();
    if segments.peek() == Some(&bucket) {
        segments.next();
    }
    let key = segments
        .map(decode_segment)
        .collect::<Option<Vec<_>>>()?
        .join("/");
    (!key.is_empty()).then_some(key)
}

/// Cloudflare R2 bucket accessed through the S3 API.
pub struct R2Storage {
    client: Client,
    bucket: String,
    public_url: Option<String>,
}

impl R2Storage {
    pub fn new(
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
        bucket: String,
        public_url: Option<String>,
    ) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new("auto"))
            .credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "r2",
            ))
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket,
            public_url,
        }
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(err) = result {
            tracing::warn!(key, "could not abort multipart upload: {}", DisplayErrorContext(err));
        }
    }

    async fn send_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart, ServiceError> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(storage_error)?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(output.e_tag().map(String::from))
            .build())
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        mut body: ByteChunks<'_>,
    ) -> Result<(Vec<CompletedPart>, u64), UploadError> {
        let mut buffer = PartBuffer::new(PART_SIZE, MAX_UPLOAD_SIZE);
        let mut parts = Vec::new();

        while let Some(bytes) = body.try_next().await? {
            for part in buffer.push(&bytes)? {
                let number = parts.len() as i32 + 1;
                parts.push(self.send_part(key, upload_id, number, part).await?);
            }
        }

        let total = buffer.total();
        let rest = buffer.finish();
        if !rest.is_empty() || parts.is_empty() {
            let number = parts.len() as i32 + 1;
            parts.push(self.send_part(key, upload_id, number, rest).await?);
        }

        Ok((parts, total))
    }
}

#[async_trait]
impl ObjectStorage for R2Storage {
    async fn upload_stream(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        body: ByteChunks<'_>,
    ) -> Result<u64, UploadError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(storage_error)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| ServiceError::new(ServiceKind::Storage, "missing multipart upload id"))?
            .to_owned();

        let (parts, total) = match self.upload_parts(key, &upload_id, body).await {
            Ok(uploaded) => uploaded,
            Err(err) => {
                self.abort_upload(key, &upload_id).await;
                return Err(err);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(storage_error)?;

        tracing::info!(key, size = total, "object uploaded");
        Ok(total)
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let body = ByteStream::from_path(path).await.map_err(storage_error)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(storage_error)?;

        tracing::info!(key, "object stored");
        Ok(())
    }

    async fn download_file(&self, key: &str, dest: &Path) -> Result<u64, ServiceError> {
        let io_error = |err: std::io::Error| ServiceError::new(ServiceKind::Storage, err.to_string());

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(storage_error)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;

        let mut body = object.body;
        let mut written: u64 = 0;
        while let Some(bytes) = body.try_next().await.map_err(storage_error)? {
            file.write_all(&bytes).await.map_err(io_error)?;
            written += bytes.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        tracing::info!(key, size = written, "object downloaded");
        Ok(written)
    }

    async fn delete_object(&self, key: &str) -> Result<(), ServiceError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn access_url(&self, key: &str) -> Result<String, ServiceError> {
        if let Some(public) = &self.public_url {
            return Ok(format!("{public}/{key}"));
        }

        let config = PresigningConfig::expires_in(PRESIGN_EXPIRATION).map_err(storage_error)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(storage_error)?;
        Ok(request.uri().to_string())
    }

    fn extract_key(&self, url: &str) -> Option<String> {
        object_key(self.public_url.as_deref(), &self.bucket, url)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn public_url_prefix_is_stripped() {
        let key = object_key(
            Some("https://cdn.example.com"),
            "videos",
            "https://cdn.example.com/videos/user_1/abc.mp4",
        );
        assert_eq!(key.as_deref(), Some("videos/user_1/abc.mp4"));
    }

    #[test]
    fn path_style_presigned_url_drops_the_bucket() {
        let key = object_key(
            None,
            "videos",
            "https://acc.r2.cloudflarestorage.com/videos/videos/user_1/lowres/v_my%20clip_360p.mp4?X-Amz-Signature=1",
        );
        assert_eq!(key.as_deref(), Some("videos/user_1/lowres/v_my clip_360p.mp4"));
    }

    #[test]
    fn virtual_hosted_presigned_url_keeps_the_whole_path() {
        let key = object_key(
            None,
            "media",
            "https://media.acc.r2.cloudflarestorage.com/videos/user_1/caf%C3%A9.mp4?X-Amz-Expires=604800",
        );
        assert_eq!(key.as_deref(), Some("videos/user_1/café.mp4"));
    }

    #[test]
    fn unknown_url_has_no_key() {
        assert_eq!(object_key(None, "videos", "https://example.com/videos/a.mp4"), None);
        assert_eq!(object_key(Some("https://cdn.example.com"), "videos", "not a url"), None);
        assert_eq!(object_key(None, "videos", "https://acc.example.com/videos?sig=1"), None);
    }

    #[test]
    fn body_is_cut_in_fixed_parts() {
        let mut buffer = PartBuffer::new(4, 100);

        assert!(buffer.push(b"ab").unwrap().is_empty());
        let parts = buffer.push(b"cdefghij").unwrap();
        assert_eq!(parts, vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"efgh")]);
        assert_eq!(buffer.total(), 10);
        assert_eq!(buffer.finish(), Bytes::from_static(b"ij"));
    }

    #[test]
    fn oversized_body_fails_while_receiving() {
        let mut buffer = PartBuffer::new(4, 10);

        assert_eq!(buffer.push(b"12345678").unwrap().len(), 2);
        let err = buffer.push(b"abc").unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { limit: 10 }));
    }
}
