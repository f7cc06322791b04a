use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;
use mime::Mime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Public URL prefix under which the upload root is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Multipart field names that may carry a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadField {
    Image,
    MobileImage,
    Photo,
    Logo,
    Document,
    Video,
    Images,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaFamily {
    Image,
    Pdf,
    Video,
}

const FIELDS: [(&str, UploadField, MediaFamily); 7] = [
    ("image", UploadField::Image, MediaFamily::Image),
    ("mobileImage", UploadField::MobileImage, MediaFamily::Image),
    ("photo", UploadField::Photo, MediaFamily::Image),
    ("logo", UploadField::Logo, MediaFamily::Image),
    ("document", UploadField::Document, MediaFamily::Pdf),
    ("video", UploadField::Video, MediaFamily::Video),
    ("images", UploadField::Images, MediaFamily::Image),
];

impl UploadField {
    pub fn from_name(name: &str) -> Option<Self> {
        FIELDS
            .iter()
            .find(|(field_name, _, _)| *field_name == name)
            .map(|(_, field, _)| *field)
    }

    pub fn name(self) -> &'static str {
        FIELDS
            .iter()
            .find(|(_, field, _)| *field == self)
            .map(|(name, _, _)| *name)
            .unwrap_or("file")
    }

    fn family(self) -> MediaFamily {
        FIELDS
            .iter()
            .find(|(_, field, _)| *field == self)
            .map(|(_, _, family)| *family)
            .unwrap_or(MediaFamily::Image)
    }

    pub fn accepts(self, content_type: &Mime) -> bool {
        match self.family() {
            MediaFamily::Image => content_type.type_() == mime::IMAGE,
            MediaFamily::Pdf => *content_type == mime::APPLICATION_PDF,
            MediaFamily::Video => content_type.type_() == mime::VIDEO,
        }
    }
}

/// A file received from a multipart form, held in memory until it is stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: UploadField,
    pub file_name: Option<String>,
    pub content_type: Option<Mime>,
    pub bytes: Bytes,
}

/// Writes uploads below a root directory, one sub-directory per resource.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    public_base: String,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `file` under `dir` and returns its relative public URL.
    pub async fn save(&self, dir: &str, file: &UploadedFile) -> AppResult<String> {
        if file.bytes.is_empty() {
            return Err(AppError::invalid(file.field.name(), "Uploaded file is empty"));
        }

        let content_type = file
            .content_type
            .as_ref()
            .ok_or_else(|| AppError::invalid(file.field.name(), "Missing file content type"))?;
        if !file.field.accepts(content_type) {
            return Err(AppError::invalid(
                file.field.name(),
                format!("File type {content_type} is not allowed"),
            ));
        }

        let extension = extension_for(file.file_name.as_deref(), content_type);
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let target_dir = self.root.join(dir);

        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(anyhow::Error::new)?;
        tokio::fs::write(target_dir.join(&file_name), &file.bytes)
            .await
            .map_err(anyhow::Error::new)?;

        debug!(dir, file_name, size = file.bytes.len(), "stored upload");
        Ok(format!("{PUBLIC_PREFIX}/{dir}/{file_name}"))
    }

    /// Removes a previously stored upload. Failures are logged, never surfaced.
    pub async fn remove(&self, url: &str) {
        let Some(path) = self.resolve(url) else {
            warn!(url, "refusing to remove upload outside the upload root");
            return;
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(url, error = %e, "failed to remove upload");
        }
    }

    pub fn absolute_url(&self, url: &str) -> String {
        format!("{}{}", self.public_base, url)
    }

    fn resolve(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX)?.trim_start_matches('/');
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        (safe && !relative.as_os_str().is_empty()).then(|| self.root.join(relative))
    }
}

fn extension_for(file_name: Option<&str>, content_type: &Mime) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| match content_type.subtype().as_str() {
            "jpeg" => "jpg".to_string(),
            "svg+xml" => "svg".to_string(),
            other => other
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn png(field: UploadField) -> UploadedFile {
        UploadedFile {
            field,
            file_name: Some("Team Photo.PNG".to_string()),
            content_type: Some(mime::IMAGE_PNG),
            bytes: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    #[test]
    fn test_field_lookup_is_closed() {
        assert_eq!(UploadField::from_name("mobileImage"), Some(UploadField::MobileImage));
        assert_eq!(UploadField::from_name("image_0"), None);
        assert_eq!(UploadField::Document.name(), "document");
    }

    #[test]
    fn test_field_accepts_family() {
        assert!(UploadField::Photo.accepts(&mime::IMAGE_JPEG));
        assert!(!UploadField::Photo.accepts(&mime::APPLICATION_PDF));
        assert!(UploadField::Document.accepts(&mime::APPLICATION_PDF));
        assert!(!UploadField::Document.accepts(&mime::IMAGE_PNG));
    }

    #[tokio::test]
    async fn test_save_and_remove() -> Result<()> {
        let dir = tempdir()?;
        let store = UploadStore::new(dir.path(), "http://localhost:5000");

        let url = store.save("directors", &png(UploadField::Photo)).await?;
        assert!(url.starts_with("/uploads/directors/"));
        assert!(url.ends_with(".png"));

        let on_disk = dir.path().join(url.trim_start_matches("/uploads/"));
        assert!(on_disk.exists());

        store.remove(&url).await;
        assert!(!on_disk.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_wrong_mime() -> Result<()> {
        let dir = tempdir()?;
        let store = UploadStore::new(dir.path(), "");
        let mut file = png(UploadField::Document);
        file.file_name = Some("brochure.pdf".to_string());

        let result = store.save("press-releases", &file).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        Ok(())
    }

    #[test]
    fn test_resolve_blocks_traversal() {
        let store = UploadStore::new("/srv/uploads", "");
        assert!(store.resolve("/uploads/../etc/passwd").is_none());
        assert!(store.resolve("/static/file.png").is_none());
        assert_eq!(
            store.resolve("/uploads/blogs/a.png"),
            Some(PathBuf::from("/srv/uploads/blogs/a.png"))
        );
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        assert_eq!(extension_for(None, &mime::IMAGE_JPEG), "jpg");
        assert_eq!(extension_for(Some("noext"), &mime::IMAGE_PNG), "png");
        assert_eq!(extension_for(Some("x.WEBP"), &mime::IMAGE_PNG), "webp");
    }
}
