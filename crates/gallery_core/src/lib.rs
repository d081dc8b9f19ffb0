use std::sync::Arc;

use shared::domain::{ImageId, Item};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

pub mod account;
pub mod drag;
pub mod error;
pub mod gateway;
pub mod http;
pub mod order;
pub mod pointer;
pub mod reconcile;
pub mod session;

pub use error::{GalleryError, GalleryResult};
pub use gateway::{AuthGateway, GalleryGateway, ImageEdit, ImageFile, ImageUpload};
pub use http::HttpGateway;
pub use pointer::{Gesture, PointerTracker};
pub use reconcile::{Mode, PendingOp, Reconciler, DEFAULT_PAGE_SIZE};
pub use session::Credential;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    Loaded {
        count: usize,
    },
    ModeChanged(Mode),
    Reordered {
        source: ImageId,
        target: ImageId,
    },
    OrderSaved,
    ImageUpdated(Item),
    ImageDeleted(ImageId),
    ImagesUploaded {
        count: usize,
    },
    PageChanged(usize),
    Failed {
        op: &'static str,
        message: String,
        retryable: bool,
    },
    /// The credential was rejected; all gallery state has been dropped.
    SessionExpired,
}

/// Owned copy of what a view needs to render the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GallerySnapshot {
    pub mode: Mode,
    pub page: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub visible: Vec<Item>,
    pub total: usize,
    pub dirty: bool,
    pub pending: Option<PendingOp>,
    pub dragging: Option<ImageId>,
}

/// Async front for a [`Reconciler`] backed by a [`GalleryGateway`].
///
/// The reconciler lock is only held for `begin_*`/`complete_*` transitions,
/// never across a gateway call, so reads stay responsive while a request is
/// in flight and a second network action is rejected with
/// [`GalleryError::Busy`].
pub struct GalleryClient {
    gateway: Arc<dyn GalleryGateway>,
    inner: Mutex<Reconciler>,
    events: broadcast::Sender<GalleryEvent>,
}

impl GalleryClient {
    pub fn new(gateway: Arc<dyn GalleryGateway>) -> Self {
        Self::with_page_size(gateway, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(gateway: Arc<dyn GalleryGateway>, page_size: usize) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            gateway,
            inner: Mutex::new(Reconciler::new(page_size)),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GalleryEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> GallerySnapshot {
        let guard = self.inner.lock().await;
        let window = guard.window();
        GallerySnapshot {
            mode: guard.mode(),
            page: window.page,
            page_count: window.page_count,
            page_size: guard.page_size(),
            visible: window.items.to_vec(),
            total: guard.working().len(),
            dirty: guard.is_dirty(),
            pending: guard.pending().cloned(),
            dragging: guard.active_drag().cloned(),
        }
    }

    pub async fn mode(&self) -> Mode {
        self.inner.lock().await.mode()
    }

    pub async fn working(&self) -> Vec<Item> {
        self.inner.lock().await.working().to_vec()
    }

    pub async fn committed(&self) -> Vec<Item> {
        self.inner.lock().await.committed().to_vec()
    }

    pub async fn page_of(&self, id: &ImageId) -> Option<usize> {
        self.inner.lock().await.page_of(id)
    }

    /// Moves to `page`, clamped to the valid range. Returns the page shown.
    pub async fn paginate(&self, page: usize) -> usize {
        let (before, after) = {
            let mut guard = self.inner.lock().await;
            let before = guard.page();
            (before, guard.paginate(page))
        };
        if before != after {
            let _ = self.events.send(GalleryEvent::PageChanged(after));
        }
        after
    }

    pub async fn refresh(&self, credential: &Credential) -> GalleryResult<usize> {
        self.check_credential(credential).await?;
        self.inner.lock().await.begin_fetch()?;
        let result = self
            .gateway
            .fetch_images(credential)
            .await
            .map(order::normalize_fetched);
        let outcome = self.inner.lock().await.complete_fetch(result);
        self.report(&PendingOp::Fetch, &outcome).await;
        outcome?;

        let count = self.inner.lock().await.working().len();
        info!(count, "gallery: collection loaded");
        let _ = self.events.send(GalleryEvent::Loaded { count });
        Ok(count)
    }

    pub async fn enter_rearrange(&self) -> GalleryResult<()> {
        self.inner.lock().await.enter_rearrange()?;
        let _ = self
            .events
            .send(GalleryEvent::ModeChanged(Mode::Rearranging));
        Ok(())
    }

    pub async fn begin_drag(&self, id: &ImageId) -> GalleryResult<()> {
        self.inner.lock().await.begin_drag(id)?;
        debug!(image_id = %id, "gallery: drag started");
        Ok(())
    }

    /// Completes the active drag over `target`. Returns whether the working
    /// order changed.
    pub async fn drop_on(&self, target: &ImageId) -> GalleryResult<bool> {
        let (source, changed) = {
            let mut guard = self.inner.lock().await;
            let source = guard.active_drag().cloned();
            (source, guard.drop_on(target)?)
        };
        if let (true, Some(source)) = (changed, source) {
            debug!(source = %source, target = %target, "gallery: reordered");
            let _ = self.events.send(GalleryEvent::Reordered {
                source,
                target: target.clone(),
            });
        }
        Ok(changed)
    }

    pub async fn end_without_drop(&self) -> Option<ImageId> {
        self.inner.lock().await.end_without_drop()
    }

    /// Applies a gesture produced by a [`PointerTracker`]. Returns the clicked
    /// image for [`Gesture::Click`] so the caller can open it.
    pub async fn handle_gesture(&self, gesture: Gesture) -> GalleryResult<Option<ImageId>> {
        match gesture {
            Gesture::Begin(id) => self.begin_drag(&id).await.map(|()| None),
            Gesture::Drop { source, target } => {
                let active = self.inner.lock().await.active_drag().cloned();
                if active.as_ref() != Some(&source) {
                    warn!(source = %source, "gallery: drop for a drag that is not active");
                    return Err(GalleryError::NoActiveDrag);
                }
                self.drop_on(&target).await.map(|_| None)
            }
            Gesture::Abandon(_) => {
                self.end_without_drop().await;
                Ok(None)
            }
            Gesture::Click(id) => Ok(Some(id)),
        }
    }

    /// Restores the order held when rearranging began. No network traffic.
    pub async fn cancel_rearrange(&self) -> GalleryResult<()> {
        self.inner.lock().await.cancel()?;
        let _ = self.events.send(GalleryEvent::ModeChanged(Mode::Viewing));
        Ok(())
    }

    /// Persists the full working order. A failed save leaves the gallery in
    /// rearrange mode with the speculative order intact so it can be retried.
    pub async fn save_order(&self, credential: &Credential) -> GalleryResult<()> {
        self.check_credential(credential).await?;
        let entries = self.inner.lock().await.begin_commit()?;
        info!(count = entries.len(), "gallery: saving order");
        let result = self.gateway.persist_order(credential, &entries).await;
        let outcome = self.inner.lock().await.complete_commit(result);
        self.report(&PendingOp::Commit, &outcome).await;
        outcome?;

        let _ = self.events.send(GalleryEvent::OrderSaved);
        let _ = self.events.send(GalleryEvent::ModeChanged(Mode::Viewing));
        Ok(())
    }

    pub async fn update_image(
        &self,
        credential: &Credential,
        id: &ImageId,
        edit: ImageEdit,
    ) -> GalleryResult<Item> {
        edit.validate()?;
        self.check_credential(credential).await?;
        self.inner.lock().await.begin_edit(id)?;
        let result = self
            .gateway
            .persist_edit(credential, id, edit)
            .await
            .map(|record| Item::new(record.id, record.title, record.image_ref));
        let outcome = self.inner.lock().await.complete_edit(id, result);
        let pending = PendingOp::Edit(id.clone());
        self.report(&pending, &outcome).await;
        let item = outcome?;

        info!(image_id = %id, "gallery: image updated");
        let _ = self.events.send(GalleryEvent::ImageUpdated(item.clone()));
        Ok(item)
    }

    pub async fn delete_image(&self, credential: &Credential, id: &ImageId) -> GalleryResult<()> {
        self.check_credential(credential).await?;
        let before = {
            let mut guard = self.inner.lock().await;
            guard.begin_delete(id)?;
            guard.page()
        };
        let result = self.gateway.persist_delete(credential, id).await;
        let (outcome, after) = {
            let mut guard = self.inner.lock().await;
            let outcome = guard.complete_delete(id, result);
            (outcome, guard.page())
        };
        let pending = PendingOp::Delete(id.clone());
        self.report(&pending, &outcome).await;
        outcome?;

        info!(image_id = %id, "gallery: image deleted");
        let _ = self.events.send(GalleryEvent::ImageDeleted(id.clone()));
        if before != after {
            let _ = self.events.send(GalleryEvent::PageChanged(after));
        }
        Ok(())
    }

    /// Uploads a batch and reloads the collection so server-assigned ids and
    /// positions are picked up. Once the server accepts the batch the upload
    /// counts as done; a failed reload is reported through a `Failed` event.
    pub async fn upload_images(
        &self,
        credential: &Credential,
        uploads: Vec<ImageUpload>,
    ) -> GalleryResult<usize> {
        let uploads = gateway::prepare_uploads(uploads)?;
        let count = uploads.len();
        self.check_credential(credential).await?;
        self.inner.lock().await.begin_create()?;
        let result = self.gateway.create_images(credential, uploads).await;
        let outcome = self.inner.lock().await.complete_create(result);
        self.report(&PendingOp::Create, &outcome).await;
        outcome?;

        info!(count, "gallery: images uploaded");
        let _ = self.events.send(GalleryEvent::ImagesUploaded { count });
        if let Err(err) = self.refresh(credential).await {
            warn!(error = %err, "gallery: reload after upload failed");
        }
        Ok(count)
    }

    /// Drops every snapshot, e.g. on logout.
    pub async fn terminate(&self) {
        self.inner.lock().await.terminate();
        let _ = self.events.send(GalleryEvent::ModeChanged(Mode::Viewing));
    }

    async fn check_credential(&self, credential: &Credential) -> GalleryResult<()> {
        if let Err(err) = credential.ensure_valid() {
            self.expire_session(&err).await;
            return Err(err);
        }
        Ok(())
    }

    async fn report<T>(&self, op: &PendingOp, outcome: &GalleryResult<T>) {
        let Err(err) = outcome else {
            return;
        };
        if let GalleryError::SessionEnded(_) = err {
            debug!(op = op.as_str(), "gallery: response arrived after the session ended");
            return;
        }
        if err.requires_reauth() {
            self.expire_session(err).await;
            return;
        }
        if err.is_retryable() {
            warn!(op = op.as_str(), error = %err, "gallery: request failed");
        } else {
            error!(op = op.as_str(), error = %err, "gallery: request failed");
        }
        let _ = self.events.send(GalleryEvent::Failed {
            op: op.as_str(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        });
    }

    async fn expire_session(&self, err: &GalleryError) {
        warn!(error = %err, "gallery: session expired, dropping gallery state");
        self.inner.lock().await.terminate();
        let _ = self.events.send(GalleryEvent::SessionExpired);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
