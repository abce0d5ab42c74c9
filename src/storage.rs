use async_trait::async_trait;
use aws_sdk_s3 as s3;
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use s3::primitives::ByteStream;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Image extensions the sink accepts.
pub const ALLOWED_IMAGE_FORMATS: &[&str] = &["jpg", "png", "jpeg", "webp"];

/// Object key prefix for every uploaded news image.
const MEDIA_FOLDER: &str = "fakebuster";

/// Display bounds; larger uploads are shrunk to fit.
pub const MAX_IMAGE_WIDTH: u32 = 1000;
pub const MAX_IMAGE_HEIGHT: u32 = 600;

/// ImageUpload
///
/// A single file part received from a multipart request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// StoredMedia
///
/// What the sink hands back after a successful upload: a public URL and the
/// identifier needed to delete the object later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    pub media_id: String,
}

/// MediaError
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Unsupported image format '{0}'. Allowed: jpg, png, jpeg, webp")]
    UnsupportedFormat(String),

    #[error("Uploaded image has no file name")]
    MissingFilename,

    /// The bytes do not decode as the image they claim to be.
    #[error("Uploaded file is not a valid image: {0}")]
    InvalidImage(String),

    #[error("Image upload failed: {0}")]
    Rejected(String),
}

/// PreparedImage
///
/// An upload that passed the policy, re-encoded if it had to be shrunk.
/// `extension` and `content_type` come from the decoded format, not the client.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub extension: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// UploadPolicy
///
/// Format allow-list, size ceiling and display bounds, enforced before any
/// bytes leave the process.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    pub allowed_formats: &'static [&'static str],
    /// Images wider or taller than this are shrunk to fit, keeping aspect ratio.
    pub max_width: u32,
    pub max_height: u32,
}

impl UploadPolicy {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_formats: ALLOWED_IMAGE_FORMATS,
            max_width: MAX_IMAGE_WIDTH,
            max_height: MAX_IMAGE_HEIGHT,
        }
    }

    /// Checks what the client declared (size, file extension, MIME type) and
    /// returns the normalized (lowercase) extension. Cheap; runs before decoding.
    pub fn check(&self, image: &ImageUpload) -> Result<String, MediaError> {
        if image.bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                size: image.bytes.len(),
                limit: self.max_bytes,
            });
        }
        if image.bytes.is_empty() {
            return Err(MediaError::Rejected("image is empty".to_string()));
        }

        let extension = std::path::Path::new(&image.file_name)
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .ok_or(MediaError::MissingFilename)?;

        if !self.allowed_formats.contains(&extension.as_str()) {
            return Err(MediaError::UnsupportedFormat(extension));
        }

        // A declared non-image MIME type is refused even with an image extension.
        if let Some(content_type) = &image.content_type
            && !content_type.starts_with("image/")
        {
            return Err(MediaError::UnsupportedFormat(content_type.clone()));
        }

        Ok(extension)
    }

    /// prepare
    ///
    /// Runs `check`, then sniffs the real format from the bytes and decodes
    /// them. Anything that is not a decodable PNG, JPEG or WebP is refused.
    /// Images larger than `max_width` x `max_height` are resized to fit and
    /// re-encoded in their own format; smaller ones are stored byte for byte.
    pub fn prepare(&self, image: ImageUpload) -> Result<PreparedImage, MediaError> {
        self.check(&image)?;

        let format = image::guess_format(&image.bytes)
            .map_err(|_| MediaError::InvalidImage("unrecognized file contents".to_string()))?;
        let (extension, content_type) = match format {
            ImageFormat::Png => ("png", "image/png"),
            ImageFormat::Jpeg => ("jpg", "image/jpeg"),
            ImageFormat::WebP => ("webp", "image/webp"),
            other => {
                let name = other.extensions_str().first().copied().unwrap_or("unknown");
                return Err(MediaError::UnsupportedFormat(name.to_string()));
            }
        };

        let decoded = image::load_from_memory_with_format(&image.bytes, format)
            .map_err(|e| MediaError::InvalidImage(e.to_string()))?;

        if decoded.width() <= self.max_width && decoded.height() <= self.max_height {
            return Ok(PreparedImage {
                extension,
                content_type,
                width: decoded.width(),
                height: decoded.height(),
                bytes: image.bytes,
            });
        }

        let resized = decoded.resize(self.max_width, self.max_height, FilterType::Triangle);
        // JPEG has no alpha channel; the WebP encoder only takes 8-bit RGB(A).
        let resized = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            ImageFormat::WebP => DynamicImage::ImageRgba8(resized.to_rgba8()),
            _ => resized,
        };

        let mut bytes = Vec::new();
        resized
            .write_to(&mut Cursor::new(&mut bytes), format)
            .map_err(|e| MediaError::Rejected(format!("re-encoding failed: {e}")))?;

        tracing::debug!(
            from_width = decoded.width(),
            from_height = decoded.height(),
            width = resized.width(),
            height = resized.height(),
            "image resized"
        );

        Ok(PreparedImage {
            extension,
            content_type,
            width: resized.width(),
            height: resized.height(),
            bytes,
        })
    }

    /// `prepare` on the blocking pool; decoding and resizing are CPU-bound.
    pub async fn prepare_blocking(&self, image: ImageUpload) -> Result<PreparedImage, MediaError> {
        let policy = self.clone();
        tokio::task::spawn_blocking(move || policy.prepare(image))
            .await
            .map_err(|e| MediaError::Rejected(format!("image processing aborted: {e}")))?
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_UPLOAD_BYTES)
    }
}

fn object_key(extension: &str) -> String {
    format!("{}/{}.{}", MEDIA_FOLDER, Uuid::new_v4(), extension)
}

// 1. MediaSink Contract
/// MediaSink
///
/// Abstract contract for the external image host. The real S3 client
/// (`S3MediaSink`) and the in-memory mock (`MockMediaSink`) are interchangeable
/// behind `MediaState`.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Ensures the configured bucket exists. Only called in `Env::Local`.
    async fn ensure_bucket_exists(&self);

    /// Stores an image after checking it against the upload policy.
    async fn upload(&self, image: ImageUpload) -> Result<StoredMedia, MediaError>;

    /// Removes a previously stored object by its media id.
    async fn delete(&self, media_id: &str) -> Result<(), MediaError>;
}

// 2. The Real Implementation (S3/MinIO/Supabase)
/// S3MediaSink
///
/// Uploads through the AWS SDK. Works against MinIO locally and Supabase
/// Storage in production; both need path-style addressing.
#[derive(Clone)]
pub struct S3MediaSink {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
    policy: UploadPolicy,
}

impl S3MediaSink {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
        policy: UploadPolicy,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    /// Public URL under which `key` is served.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl MediaSink for S3MediaSink {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn upload(&self, image: ImageUpload) -> Result<StoredMedia, MediaError> {
        let prepared = self.policy.prepare_blocking(image).await?;
        let key = object_key(prepared.extension);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(prepared.content_type)
            .body(ByteStream::from(prepared.bytes))
            .send()
            .await
            .map_err(|e| MediaError::Rejected(s3::error::DisplayErrorContext(e).to_string()))?;

        tracing::info!(media_id = %key, "image uploaded");

        Ok(StoredMedia {
            url: self.public_url(&key),
            media_id: key,
        })
    }

    async fn delete(&self, media_id: &str) -> Result<(), MediaError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(media_id)
            .send()
            .await
            .map_err(|e| MediaError::Rejected(s3::error::DisplayErrorContext(e).to_string()))?;
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockMediaSink
///
/// In-memory sink that applies the same upload policy as the real one and
/// records which objects are currently stored, with their prepared bytes.
#[derive(Clone)]
pub struct MockMediaSink {
    /// When true, every upload and delete fails after the policy check.
    pub should_fail: bool,
    policy: UploadPolicy,
    objects: Arc<Mutex<HashMap<String, PreparedImage>>>,
}

impl MockMediaSink {
    pub fn new() -> Self {
        Self::with_policy(UploadPolicy::default())
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn with_policy(policy: UploadPolicy) -> Self {
        Self {
            should_fail: false,
            policy,
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Media ids currently held, sorted.
    pub fn stored(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        let mut ids: Vec<String> = objects.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The prepared image stored under `media_id`, if any.
    pub fn object(&self, media_id: &str) -> Option<PreparedImage> {
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(media_id)
            .cloned()
    }
}

impl Default for MockMediaSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSink for MockMediaSink {
    async fn ensure_bucket_exists(&self) {}

    async fn upload(&self, image: ImageUpload) -> Result<StoredMedia, MediaError> {
        let prepared = self.policy.prepare_blocking(image).await?;
        if self.should_fail {
            return Err(MediaError::Rejected(
                "Mock Media Error: Simulation requested".to_string(),
            ));
        }

        let key = object_key(prepared.extension);
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.clone(), prepared);

        Ok(StoredMedia {
            url: format!("http://localhost:9000/mock-bucket/{}", key),
            media_id: key,
        })
    }

    async fn delete(&self, media_id: &str) -> Result<(), MediaError> {
        if self.should_fail {
            return Err(MediaError::Rejected(
                "Mock Media Error: Simulation requested".to_string(),
            ));
        }
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(media_id);
        Ok(())
    }
}

/// MediaState
///
/// The concrete type used to share the media sink across the application state.
pub type MediaState = Arc<dyn MediaSink>;
