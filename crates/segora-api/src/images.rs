use std::path::PathBuf;

use anyhow::Result;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::info;

use segora_types::api::{Claims, ImageUploadResponse};

use crate::auth::AppState;
use crate::error::ApiError;

/// Listing images are capped at 5 MB.
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Every uploaded image lives under this prefix.
const IMAGE_DIR: &str = "item-images";

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// Listing images on local disk, content-addressed:
/// `{root}/item-images/{sha256}.{ext}`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    public_base: String,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// URL under which `path` is served.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/images/{}", self.public_base, path)
    }

    /// Store an image and return its storage path. Identical bytes map to the
    /// same path, so re-uploading is harmless.
    pub async fn upload(&self, bytes: &[u8], content_type: &str) -> Result<String, ApiError> {
        let ext = extension_for(content_type)
            .ok_or_else(|| ApiError::validation("only JPEG, PNG, WebP and GIF images are accepted"))?;
        if bytes.is_empty() {
            return Err(ApiError::validation("image is empty"));
        }
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(ApiError::PayloadTooLarge);
        }

        let digest = hex::encode(Sha256::digest(bytes));
        let path = format!("{}/{}.{}", IMAGE_DIR, digest, ext);
        self.write(&path, bytes).await?;
        Ok(path)
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.root.join(IMAGE_DIR);
        fs::create_dir_all(&dir).await?;

        let target = self.root.join(path);
        if fs::try_exists(&target).await? {
            return Ok(());
        }

        // Write then rename so readers never see a partial file
        let tmp = target.with_extension("part");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &target).await?;
        Ok(())
    }

    /// Read a stored image. `None` for unknown or malformed paths.
    pub async fn read(&self, path: &str) -> Result<Option<(Vec<u8>, &'static str)>> {
        let Some(content_type) = validate_path(path) else {
            return Ok(None);
        };
        match fs::read(self.root.join(path)).await {
            Ok(bytes) => Ok(Some((bytes, content_type))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
}

/// Accept only `item-images/{64 hex}.{known ext}` and return its content type.
fn validate_path(path: &str) -> Option<&'static str> {
    let name = path.strip_prefix(IMAGE_DIR)?.strip_prefix('/')?;
    let (digest, ext) = name.split_once('.')?;
    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    IMAGE_TYPES
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(mime, _)| *mime)
}

/// POST /images: raw image bytes with an image content type.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let path = state.images.upload(&body, content_type).await?;
    info!("{} uploaded {} ({} bytes)", claims.sub, path, body.len());

    Ok((
        StatusCode::CREATED,
        Json(ImageUploadResponse {
            public_url: state.images.public_url(&path),
            path,
        }),
    ))
}

/// GET /images/{*path}
pub async fn serve_image(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (bytes, content_type) = state
        .images
        .read(&path)
        .await?
        .ok_or(ApiError::NotFound("image"))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ImageStore {
        let dir = std::env::temp_dir().join(format!("segora_images_{}", uuid::Uuid::new_v4()));
        ImageStore::new(dir, "http://localhost:3000/")
    }

    #[test]
    fn content_types_map_to_extensions() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for(""), None);
    }

    #[test]
    fn only_content_addressed_paths_are_served() {
        let digest = "a".repeat(64);
        assert_eq!(validate_path(&format!("item-images/{}.png", digest)), Some("image/png"));
        assert_eq!(validate_path("item-images/../../etc/passwd"), None);
        assert_eq!(validate_path(&format!("item-images/{}.exe", digest)), None);
        assert_eq!(validate_path(&format!("other/{}.png", digest)), None);
    }

    #[test]
    fn public_url_joins_cleanly() {
        assert_eq!(
            store().public_url("item-images/abc.png"),
            "http://localhost:3000/images/item-images/abc.png"
        );
    }

    #[tokio::test]
    async fn upload_then_read_back() {
        let store = store();
        let path = store.upload(b"\x89PNG fake", "image/png").await.unwrap();
        assert!(path.starts_with("item-images/") && path.ends_with(".png"));

        let again = store.upload(b"\x89PNG fake", "image/png").await.unwrap();
        assert_eq!(path, again);

        let (bytes, content_type) = store.read(&path).await.unwrap().unwrap();
        assert_eq!(bytes, b"\x89PNG fake");
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn oversized_or_non_image_uploads_are_rejected() {
        let store = store();
        let big = vec![0u8; MAX_IMAGE_SIZE + 1];
        assert!(matches!(
            store.upload(&big, "image/jpeg").await,
            Err(ApiError::PayloadTooLarge)
        ));
        assert!(matches!(
            store.upload(b"%PDF", "application/pdf").await,
            Err(ApiError::Validation(_))
        ));
    }
}
