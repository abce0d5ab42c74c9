//! Request-body extractor for the create and update endpoints.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{errors::AppError, storage::ImageUpload};

/// Multipart part carrying the optional image.
pub const IMAGE_FIELD: &str = "image";

/// NewsForm
///
/// A typed payload plus an optional image. Accepts either
/// `application/json` (no image) or `multipart/form-data` where every
/// non-file part is a text field of `T` and the `image` part is the file.
/// Field names are checked against `T`'s schema, so unknown or malformed
/// fields fail here with a 400 before the service runs.
#[derive(Debug)]
pub struct NewsForm<T> {
    pub payload: T,
    pub image: Option<ImageUpload>,
}

impl<S, T> FromRequest<S> for NewsForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state).await?;
            read_multipart(multipart).await
        } else {
            let Json(payload) = Json::<T>::from_request(req, state).await?;
            Ok(NewsForm {
                payload,
                image: None,
            })
        }
    }
}

async fn read_multipart<T: DeserializeOwned>(
    mut multipart: Multipart,
) -> Result<NewsForm<T>, AppError> {
    let mut fields = Map::new();
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        if name == IMAGE_FIELD {
            if image.is_some() {
                return Err(AppError::bad_request("Only one image may be uploaded"));
            }
            let file_name = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;

            // An untouched file input submits an empty, unnamed part.
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            image = Some(ImageUpload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let text = field.text().await?;
            fields.insert(name, Value::String(text));
        }
    }

    let payload = serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    Ok(NewsForm { payload, image })
}
