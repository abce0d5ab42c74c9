use fakebuster_api::storage::{
    ImageUpload, MediaError, MediaSink, MockMediaSink, S3MediaSink, UploadPolicy,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Filler bytes; only good for checks that run before decoding.
fn upload(name: &str, content_type: Option<&str>, len: usize) -> ImageUpload {
    ImageUpload {
        file_name: name.to_string(),
        content_type: content_type.map(str::to_string),
        bytes: vec![7u8; len],
    }
}

/// A real encoded image.
fn encoded(name: &str, format: ImageFormat, width: u32, height: u32) -> ImageUpload {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    ImageUpload {
        file_name: name.to_string(),
        content_type: None,
        bytes,
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockMediaSink::new();
        let stored = mock
            .upload(encoded("evidence.jpg", ImageFormat::Jpeg, 64, 64))
            .await
            .unwrap();

        assert!(stored.media_id.starts_with("fakebuster/"));
        assert!(stored.media_id.ends_with(".jpg"));
        assert!(stored.url.ends_with(&stored.media_id));
        assert_eq!(mock.stored(), vec![stored.media_id]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockMediaSink::new_failing();
        let result = mock.upload(encoded("evidence.png", ImageFormat::Png, 64, 64)).await;
        assert!(matches!(result, Err(MediaError::Rejected(_))));
        assert!(mock.stored().is_empty());
    }

    #[tokio::test]
    async fn test_mock_enforces_policy() {
        let mock = MockMediaSink::with_policy(UploadPolicy::new(100));

        let too_large = mock.upload(upload("big.webp", None, 101)).await;
        assert!(matches!(too_large, Err(MediaError::TooLarge { .. })));

        let wrong_format = mock.upload(upload("clip.gif", Some("image/gif"), 10)).await;
        assert!(matches!(wrong_format, Err(MediaError::UnsupportedFormat(_))));

        let disguised = mock
            .upload(upload("script.png", Some("text/html"), 10))
            .await;
        assert!(matches!(disguised, Err(MediaError::UnsupportedFormat(_))));

        let forged = mock
            .upload(ImageUpload {
                file_name: "payload.png".to_string(),
                content_type: Some("image/png".to_string()),
                bytes: b"<html><script>alert(1)</script></html>".to_vec(),
            })
            .await;
        assert!(matches!(forged, Err(MediaError::InvalidImage(_))));

        assert!(mock.stored().is_empty());
    }

    #[tokio::test]
    async fn test_mock_stores_shrunk_image() {
        let mock = MockMediaSink::new();
        let stored = mock
            .upload(encoded("poster.webp", ImageFormat::WebP, 1200, 1200))
            .await
            .unwrap();

        let object = mock.object(&stored.media_id).unwrap();
        assert_eq!((object.width, object.height), (600, 600));
        assert_eq!(object.content_type, "image/webp");
        assert!(stored.media_id.ends_with(".webp"));
    }

    #[tokio::test]
    async fn test_mock_keys_follow_real_format() {
        let mock = MockMediaSink::new();
        let stored = mock
            .upload(encoded("renamed.webp", ImageFormat::Png, 4, 4))
            .await
            .unwrap();
        assert!(stored.media_id.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_mock_delete_removes_object() {
        let mock = MockMediaSink::new();
        let stored = mock.upload(encoded("a.jpeg", ImageFormat::Jpeg, 8, 8)).await.unwrap();

        mock.delete(&stored.media_id).await.unwrap();
        assert!(mock.stored().is_empty());
    }

    #[tokio::test]
    async fn test_upload_keys_are_unique() {
        let mock = MockMediaSink::new();
        let first = mock.upload(encoded("same.png", ImageFormat::Png, 8, 8)).await.unwrap();
        let second = mock.upload(encoded("same.png", ImageFormat::Png, 8, 8)).await.unwrap();
        assert_ne!(first.media_id, second.media_id);
        assert_eq!(mock.stored().len(), 2);
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    fn client() -> S3MediaSink {
        S3MediaSink::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
            "http://localhost:9000/testbucket/",
            UploadPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_s3_public_url() {
        let sink = client();
        assert_eq!(
            sink.public_url("fakebuster/abc.jpg"),
            "http://localhost:9000/testbucket/fakebuster/abc.jpg"
        );
    }

    #[tokio::test]
    async fn test_s3_rejects_before_network() {
        // Nothing listens on this endpoint; the policy must refuse first.
        let sink = client();
        let result = sink.upload(upload("notes.pdf", None, 10)).await;
        assert!(matches!(result, Err(MediaError::UnsupportedFormat(_))));
    }
}
