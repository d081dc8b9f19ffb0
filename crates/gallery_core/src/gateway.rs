//! Collaborator contracts the gallery core persists through.

use async_trait::async_trait;
use shared::{
    domain::ImageId,
    protocol::{ImageRecord, OrderEntry, RegisterRequest},
};

use crate::{
    error::{GalleryError, GalleryResult},
    session::Credential,
};

/// An image file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEdit {
    pub title: String,
    pub image: Option<ImageFile>,
}

impl ImageEdit {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageFile) -> Self {
        self.image = Some(image);
        self
    }

    pub fn validate(&self) -> GalleryResult<()> {
        if self.title.trim().is_empty() {
            return Err(GalleryError::Validation("title must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file: ImageFile,
    pub title: String,
}

impl ImageUpload {
    pub fn new(file: ImageFile, title: impl Into<String>) -> Self {
        Self {
            file,
            title: title.into(),
        }
    }
}

/// Fills blank titles with `Image {n}` (1-based) and rejects an empty batch.
pub fn prepare_uploads(mut uploads: Vec<ImageUpload>) -> GalleryResult<Vec<ImageUpload>> {
    if uploads.is_empty() {
        return Err(GalleryError::Validation("no images selected".into()));
    }
    for (index, upload) in uploads.iter_mut().enumerate() {
        if upload.file.bytes.is_empty() {
            return Err(GalleryError::Validation(format!(
                "image '{}' is empty",
                upload.file.filename
            )));
        }
        let trimmed = upload.title.trim();
        upload.title = if trimmed.is_empty() {
            format!("Image {}", index + 1)
        } else {
            trimmed.to_string()
        };
    }
    Ok(uploads)
}

/// Persistence for a user's gallery. Every call carries the caller's
/// credential; a rejected credential surfaces as `GalleryError::Unauthorized`.
#[async_trait]
pub trait GalleryGateway: Send + Sync {
    async fn fetch_images(&self, credential: &Credential) -> GalleryResult<Vec<ImageRecord>>;

    /// Replaces the persisted order with the full mapping. Resubmitting the
    /// same mapping must leave the same final state.
    async fn persist_order(
        &self,
        credential: &Credential,
        entries: &[OrderEntry],
    ) -> GalleryResult<()>;

    async fn persist_edit(
        &self,
        credential: &Credential,
        id: &ImageId,
        edit: ImageEdit,
    ) -> GalleryResult<ImageRecord>;

    async fn persist_delete(&self, credential: &Credential, id: &ImageId) -> GalleryResult<()>;

    async fn create_images(
        &self,
        credential: &Credential,
        uploads: Vec<ImageUpload>,
    ) -> GalleryResult<()>;
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> GalleryResult<Credential>;

    async fn register(&self, registration: RegisterRequest) -> GalleryResult<Credential>;

    async fn change_password(
        &self,
        credential: &Credential,
        old_password: &str,
        new_password: &str,
    ) -> GalleryResult<()>;
}
