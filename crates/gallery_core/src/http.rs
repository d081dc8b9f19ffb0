//! Gallery API over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use shared::{
    domain::ImageId,
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        AuthResponse, ChangePasswordRequest, ImageRecord, ImagesResponse, LoginRequest,
        OrderEntry, RegisterRequest, UpdateImageResponse, UpdateOrderRequest,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{GalleryError, GalleryResult},
    gateway::{AuthGateway, GalleryGateway, ImageEdit, ImageFile, ImageUpload},
    session::Credential,
};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub struct HttpGateway {
    http: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> GalleryResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> GalleryResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GalleryError::from)?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> GalleryResult<Self> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|e| GalleryError::Validation(format!("invalid server url '{base_url}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(GalleryError::Validation(
                "server url must start with http:// or https://".into(),
            ));
        }
        // Url::join replaces the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> GalleryResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GalleryError::Validation(format!("invalid endpoint '{path}': {e}")))
    }

    fn image_endpoint(&self, route: &str, id: &ImageId) -> GalleryResult<Url> {
        let mut url = self.endpoint(route)?;
        url.path_segments_mut()
            .map_err(|_| GalleryError::Validation("server url cannot be a base".into()))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> GalleryResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<ApiError>().await.unwrap_or_default();
        let err = classify_failure(&ApiException::new(status.as_u16(), body));
        warn!(status = status.as_u16(), error = %err, "gallery api: request rejected");
        Err(err)
    }
}

/// Maps a rejected response onto the gallery error taxonomy.
pub fn classify_failure(failure: &ApiException) -> GalleryError {
    let status = StatusCode::from_u16(failure.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = &failure.body;
    match (status, body.code) {
        (StatusCode::UNAUTHORIZED, _) => GalleryError::Unauthorized(
            body.message_or("unauthorized, please log in again").to_string(),
        ),
        (StatusCode::FORBIDDEN, Some(ErrorCode::AccountInactive)) => GalleryError::Unauthorized(
            body.message_or("account is inactive, contact support").to_string(),
        ),
        (StatusCode::FORBIDDEN, Some(ErrorCode::NotVerified)) => GalleryError::Validation(
            body.message_or("account is not verified").to_string(),
        ),
        (StatusCode::FORBIDDEN, _)
        | (StatusCode::BAD_REQUEST, _)
        | (StatusCode::NOT_FOUND, _)
        | (StatusCode::CONFLICT, _)
        | (StatusCode::PAYLOAD_TOO_LARGE, _)
        | (StatusCode::UNPROCESSABLE_ENTITY, _) => {
            GalleryError::Validation(body.message_or(status.as_str()).to_string())
        }
        _ => GalleryError::Transport(format!(
            "server responded {}: {}",
            status.as_u16(),
            body.message_or("no message")
        )),
    }
}

fn file_part(file: ImageFile) -> GalleryResult<Part> {
    let mime_type = file
        .mime_type
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
    Part::bytes(file.bytes)
        .file_name(file.filename)
        .mime_str(&mime_type)
        .map_err(|e| GalleryError::Validation(format!("invalid mime type '{mime_type}': {e}")))
}

#[async_trait]
impl GalleryGateway for HttpGateway {
    async fn fetch_images(&self, credential: &Credential) -> GalleryResult<Vec<ImageRecord>> {
        let response: ImagesResponse = self
            .send(
                self.http
                    .get(self.endpoint("getImages")?)
                    .bearer_auth(credential.token()),
            )
            .await?
            .json()
            .await?;
        debug!(count = response.images.len(), "gallery api: fetched images");
        Ok(response.images)
    }

    async fn persist_order(
        &self,
        credential: &Credential,
        entries: &[OrderEntry],
    ) -> GalleryResult<()> {
        self.send(
            self.http
                .put(self.endpoint("updateImageOrder")?)
                .bearer_auth(credential.token())
                .json(&UpdateOrderRequest {
                    images: entries.to_vec(),
                }),
        )
        .await?;
        Ok(())
    }

    async fn persist_edit(
        &self,
        credential: &Credential,
        id: &ImageId,
        edit: ImageEdit,
    ) -> GalleryResult<ImageRecord> {
        let mut form = Form::new().text("title", edit.title);
        if let Some(image) = edit.image {
            form = form.part("image", file_part(image)?);
        }
        let response: UpdateImageResponse = self
            .send(
                self.http
                    .put(self.image_endpoint("updateImage", id)?)
                    .bearer_auth(credential.token())
                    .multipart(form),
            )
            .await?
            .json()
            .await?;
        Ok(response.image)
    }

    async fn persist_delete(&self, credential: &Credential, id: &ImageId) -> GalleryResult<()> {
        self.send(
            self.http
                .delete(self.image_endpoint("deleteImage", id)?)
                .bearer_auth(credential.token()),
        )
        .await?;
        Ok(())
    }

    async fn create_images(
        &self,
        credential: &Credential,
        uploads: Vec<ImageUpload>,
    ) -> GalleryResult<()> {
        let mut form = Form::new();
        for upload in uploads {
            form = form
                .part("images", file_part(upload.file)?)
                .text("titles", upload.title);
        }
        self.send(
            self.http
                .post(self.endpoint("upload-images")?)
                .bearer_auth(credential.token())
                .multipart(form),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthGateway for HttpGateway {
    async fn login(&self, email: &str, password: &str) -> GalleryResult<Credential> {
        let response: AuthResponse = self
            .send(self.http.post(self.endpoint("login")?).json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            }))
            .await?
            .json()
            .await?;
        Ok(Credential::bearer(response.access_token))
    }

    async fn register(&self, registration: RegisterRequest) -> GalleryResult<Credential> {
        let response: AuthResponse = self
            .send(self.http.post(self.endpoint("register")?).json(&registration))
            .await?
            .json()
            .await?;
        Ok(Credential::bearer(response.access_token))
    }

    async fn change_password(
        &self,
        credential: &Credential,
        old_password: &str,
        new_password: &str,
    ) -> GalleryResult<()> {
        credential.ensure_valid()?;
        self.send(
            self.http
                .post(self.endpoint("changePassword")?)
                .bearer_auth(credential.token())
                .json(&ChangePasswordRequest {
                    old_password: old_password.to_string(),
                    new_password: new_password.to_string(),
                }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
