//! Working/committed reconciliation for a gallery collection.
//!
//! `Reconciler` is synchronous and performs no I/O. Network-touching actions
//! are split into a `begin_*` transition, which claims the single in-flight
//! slot and returns what the gateway needs, and a `complete_*` transition that
//! consumes the gateway's result.

use std::fmt;

use shared::{
    domain::{ImageId, Item},
    protocol::OrderEntry,
};
use tracing::{debug, error, info};

use crate::{
    drag::{DragSession, DropOutcome},
    error::{GalleryError, GalleryResult},
    order,
};

pub const DEFAULT_PAGE_SIZE: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Viewing,
    Rearranging,
}

/// The network request currently awaiting a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    Fetch,
    Commit,
    Edit(ImageId),
    Delete(ImageId),
    Create,
}

impl PendingOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Commit => "commit",
            Self::Edit(_) => "edit",
            Self::Delete(_) => "delete",
            Self::Create => "create",
        }
    }
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page of the working collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow<'a> {
    /// 1-based.
    pub page: usize,
    pub page_count: usize,
    pub items: &'a [Item],
}

/// A claimed request and the session it was sent in.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    op: PendingOp,
    epoch: u64,
}

#[derive(Debug)]
pub struct Reconciler {
    mode: Mode,
    working: Vec<Item>,
    committed: Vec<Item>,
    rollback: Option<Vec<Item>>,
    page: usize,
    page_size: usize,
    drag: DragSession,
    pending: Option<InFlight>,
    /// Bumped by `terminate`; completions from an earlier session are discarded.
    epoch: u64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Reconciler {
    pub fn new(page_size: usize) -> Self {
        Self {
            mode: Mode::Viewing,
            working: Vec::new(),
            committed: Vec::new(),
            rollback: None,
            page: 1,
            page_size: page_size.max(1),
            drag: DragSession::default(),
            pending: None,
            epoch: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn working(&self) -> &[Item] {
        &self.working
    }

    pub fn committed(&self) -> &[Item] {
        &self.committed
    }

    pub fn pending(&self) -> Option<&PendingOp> {
        self.pending.as_ref().map(|in_flight| &in_flight.op)
    }

    pub fn active_drag(&self) -> Option<&ImageId> {
        self.drag.active()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Unsaved speculative reordering exists.
    pub fn is_dirty(&self) -> bool {
        self.working != self.committed
    }

    pub fn page_count(&self) -> usize {
        self.working.len().div_ceil(self.page_size).max(1)
    }

    pub fn window(&self) -> PageWindow<'_> {
        let start = ((self.page - 1) * self.page_size).min(self.working.len());
        let end = (start + self.page_size).min(self.working.len());
        PageWindow {
            page: self.page,
            page_count: self.page_count(),
            items: &self.working[start..end],
        }
    }

    /// Page holding `id` in the working collection.
    pub fn page_of(&self, id: &ImageId) -> Option<usize> {
        self.working
            .iter()
            .position(|item| &item.id == id)
            .map(|position| position / self.page_size + 1)
    }

    /// Moves to `page`, clamped into the valid range. Returns the page shown.
    pub fn paginate(&mut self, page: usize) -> usize {
        self.page = page.clamp(1, self.page_count());
        self.page
    }

    fn clamp_page(&mut self) {
        self.page = self.page.clamp(1, self.page_count());
    }

    fn require_mode(&self, expected: Mode) -> GalleryResult<()> {
        if self.mode != expected {
            return Err(GalleryError::WrongMode {
                expected,
                actual: self.mode,
            });
        }
        Ok(())
    }

    fn require_idle_network(&self) -> GalleryResult<()> {
        match &self.pending {
            Some(in_flight) => Err(GalleryError::Busy(in_flight.op.clone())),
            None => Ok(()),
        }
    }

    fn claim(&mut self, op: PendingOp) -> GalleryResult<()> {
        self.require_idle_network()?;
        debug!(op = %op, "gallery: request in flight");
        self.pending = Some(InFlight {
            op,
            epoch: self.epoch,
        });
        Ok(())
    }

    fn release(&mut self, expected: PendingOp) -> GalleryResult<()> {
        if self.pending() != Some(&expected) {
            return Err(GalleryError::NotPending(expected));
        }
        let current = self.epoch;
        if self.pending.take().is_some_and(|in_flight| in_flight.epoch != current) {
            debug!(op = %expected, "gallery: discarding response from an ended session");
            return Err(GalleryError::SessionEnded(expected));
        }
        Ok(())
    }

    fn require_member(&self, id: &ImageId) -> GalleryResult<()> {
        order::position_of(&self.working, id).map(|_| ())
    }

    // Fetch

    pub fn begin_fetch(&mut self) -> GalleryResult<()> {
        self.require_mode(Mode::Viewing)?;
        self.claim(PendingOp::Fetch)
    }

    /// Replaces both snapshots with a freshly fetched collection.
    pub fn complete_fetch(&mut self, result: GalleryResult<Vec<Item>>) -> GalleryResult<()> {
        self.release(PendingOp::Fetch)?;
        let items = result?;
        self.replace_collection(items);
        Ok(())
    }

    fn replace_collection(&mut self, mut items: Vec<Item>) {
        if !order::is_contiguous(&items) {
            order::reindex(&mut items);
        }
        self.committed = items.clone();
        self.working = items;
        self.clamp_page();
    }

    // Rearranging

    pub fn enter_rearrange(&mut self) -> GalleryResult<()> {
        self.require_mode(Mode::Viewing)?;
        self.require_idle_network()?;
        self.rollback = Some(self.working.clone());
        self.mode = Mode::Rearranging;
        info!(count = self.working.len(), "gallery: entered rearrange mode");
        Ok(())
    }

    pub fn begin_drag(&mut self, id: &ImageId) -> GalleryResult<()> {
        self.require_mode(Mode::Rearranging)?;
        self.require_idle_network()?;
        let start = (self.page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.working.len());
        let visible = self.working.get(start..end).unwrap_or_default();
        self.drag.begin(id, visible)
    }

    /// Drops the active drag on `target`. Returns whether `working` changed.
    pub fn drop_on(&mut self, target: &ImageId) -> GalleryResult<bool> {
        self.require_mode(Mode::Rearranging)?;
        match self.drag.drop_on(target, &self.working) {
            Ok(DropOutcome::Unchanged) => Ok(false),
            Ok(DropOutcome::Reordered(items)) => {
                self.working = items;
                Ok(true)
            }
            Err(GalleryError::NotFound(id)) => {
                error!(image_id = %id, "gallery: drop referenced an image outside the working set");
                Err(GalleryError::NotFound(id))
            }
            Err(err) => Err(err),
        }
    }

    pub fn end_without_drop(&mut self) -> Option<ImageId> {
        self.drag.end_without_drop()
    }

    /// Claims the in-flight slot for a save and returns the full mapping.
    pub fn begin_commit(&mut self) -> GalleryResult<Vec<OrderEntry>> {
        self.require_mode(Mode::Rearranging)?;
        if let Some(active) = self.drag.active() {
            return Err(GalleryError::DragInProgress(active.clone()));
        }
        self.claim(PendingOp::Commit)?;
        Ok(order::order_entries(&self.working))
    }

    /// On success `working` becomes `committed`; on failure nothing changes and
    /// the gallery stays in rearrange mode.
    pub fn complete_commit(&mut self, result: GalleryResult<()>) -> GalleryResult<()> {
        self.release(PendingOp::Commit)?;
        result?;
        self.committed = self.working.clone();
        self.rollback = None;
        self.mode = Mode::Viewing;
        info!(count = self.committed.len(), "gallery: order committed");
        Ok(())
    }

    /// Discards speculative reordering. Never touches the network.
    pub fn cancel(&mut self) -> GalleryResult<()> {
        self.require_mode(Mode::Rearranging)?;
        if self.pending() == Some(&PendingOp::Commit) {
            return Err(GalleryError::Busy(PendingOp::Commit));
        }
        self.drag.end_without_drop();
        self.working = self
            .rollback
            .take()
            .unwrap_or_else(|| self.committed.clone());
        self.mode = Mode::Viewing;
        self.clamp_page();
        info!("gallery: rearrange cancelled");
        Ok(())
    }

    // Single-item persistence

    pub fn begin_delete(&mut self, id: &ImageId) -> GalleryResult<()> {
        self.require_mode(Mode::Viewing)?;
        self.require_idle_network()?;
        self.require_member(id)?;
        self.claim(PendingOp::Delete(id.clone()))
    }

    /// Removes the image from both snapshots and re-clamps the page.
    pub fn complete_delete(&mut self, id: &ImageId, result: GalleryResult<()>) -> GalleryResult<()> {
        self.release(PendingOp::Delete(id.clone()))?;
        result?;
        for items in [&mut self.working, &mut self.committed] {
            items.retain(|item| &item.id != id);
            order::reindex(items);
        }
        self.clamp_page();
        Ok(())
    }

    pub fn begin_edit(&mut self, id: &ImageId) -> GalleryResult<()> {
        self.require_mode(Mode::Viewing)?;
        self.require_idle_network()?;
        self.require_member(id)?;
        self.claim(PendingOp::Edit(id.clone()))
    }

    /// Refreshes title and image reference in both snapshots. `order` stays.
    pub fn complete_edit(
        &mut self,
        id: &ImageId,
        result: GalleryResult<Item>,
    ) -> GalleryResult<Item> {
        self.release(PendingOp::Edit(id.clone()))?;
        let updated = result?;
        let mut refreshed = None;
        for items in [&mut self.working, &mut self.committed] {
            if let Some(item) = items.iter_mut().find(|item| &item.id == id) {
                item.title = updated.title.clone();
                item.image_ref = updated.image_ref.clone();
                refreshed = Some(item.clone());
            }
        }
        refreshed.ok_or_else(|| GalleryError::NotFound(id.clone()))
    }

    pub fn begin_create(&mut self) -> GalleryResult<()> {
        self.require_mode(Mode::Viewing)?;
        self.claim(PendingOp::Create)
    }

    pub fn complete_create(&mut self, result: GalleryResult<()>) -> GalleryResult<()> {
        self.release(PendingOp::Create)?;
        result
    }

    /// Drops everything held for the session.
    pub fn terminate(&mut self) {
        self.mode = Mode::Viewing;
        self.working.clear();
        self.committed.clear();
        self.rollback = None;
        self.page = 1;
        self.drag.end_without_drop();
        // A request still out keeps the slot until its response arrives.
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
