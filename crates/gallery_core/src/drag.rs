//! In-progress drag gesture over the working collection.

use shared::domain::{ImageId, Item};

use crate::{
    error::{GalleryError, GalleryResult},
    order,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(ImageId),
}

/// Result of releasing a drag over a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Dropped onto itself; nothing moved.
    Unchanged,
    Reordered(Vec<Item>),
}

#[derive(Debug, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn active(&self) -> Option<&ImageId> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(id) => Some(id),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active().is_some()
    }

    /// Starts dragging `id`, which must be one of the `visible` items.
    pub fn begin(&mut self, id: &ImageId, visible: &[Item]) -> GalleryResult<()> {
        if let DragState::Dragging(active) = &self.state {
            return Err(GalleryError::DragInProgress(active.clone()));
        }
        if !visible.iter().any(|item| &item.id == id) {
            return Err(GalleryError::NotOnPage(id.clone()));
        }
        self.state = DragState::Dragging(id.clone());
        Ok(())
    }

    /// Ends the gesture over `target`, reordering the whole `working` sequence.
    /// The session is idle afterwards whatever the outcome.
    pub fn drop_on(&mut self, target: &ImageId, working: &[Item]) -> GalleryResult<DropOutcome> {
        let active = match std::mem::take(&mut self.state) {
            DragState::Idle => return Err(GalleryError::NoActiveDrag),
            DragState::Dragging(active) => active,
        };
        if &active == target {
            return Ok(DropOutcome::Unchanged);
        }
        order::move_item(working, &active, target).map(DropOutcome::Reordered)
    }

    /// Released outside any valid target.
    pub fn end_without_drop(&mut self) -> Option<ImageId> {
        match std::mem::take(&mut self.state) {
            DragState::Idle => None,
            DragState::Dragging(id) => Some(id),
        }
    }
}
