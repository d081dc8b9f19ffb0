//! Raw pointer events to drag gestures.
//!
//! A press only becomes a drag once the pointer travels past a small
//! threshold, so plain clicks on a card still reach the card.

use shared::domain::ImageId;

/// Movement threshold in pixels before a press turns into a drag.
pub const DRAG_THRESHOLD_PX: u32 = 5;

/// What the gallery should do in response to pointer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    Begin(ImageId),
    Drop { source: ImageId, target: ImageId },
    /// Released over nothing droppable.
    Abandon(ImageId),
    Click(ImageId),
}

#[derive(Debug, Clone)]
struct Press {
    id: ImageId,
    x: i32,
    y: i32,
}

#[derive(Debug)]
pub struct PointerTracker {
    threshold: u32,
    pending: Option<Press>,
    dragging: Option<ImageId>,
    hover: Option<ImageId>,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::with_threshold(DRAG_THRESHOLD_PX)
    }
}

impl PointerTracker {
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            threshold,
            pending: None,
            dragging: None,
            hover: None,
        }
    }

    pub fn dragging(&self) -> Option<&ImageId> {
        self.dragging.as_ref()
    }

    pub fn hover(&self) -> Option<&ImageId> {
        self.hover.as_ref()
    }

    /// Primary button went down on a card.
    pub fn press(&mut self, id: ImageId, x: i32, y: i32) {
        if self.dragging.is_some() {
            return;
        }
        self.pending = Some(Press { id, x, y });
    }

    pub fn motion(&mut self, x: i32, y: i32) -> Option<Gesture> {
        if self.dragging.is_some() {
            return None;
        }
        let press = self.pending.as_ref()?;
        let dx = x.abs_diff(press.x);
        let dy = y.abs_diff(press.y);
        if dx > self.threshold || dy > self.threshold {
            let id = press.id.clone();
            self.dragging = Some(id.clone());
            return Some(Gesture::Begin(id));
        }
        None
    }

    /// Pointer entered a card while dragging.
    pub fn enter(&mut self, id: ImageId) {
        match &self.dragging {
            Some(dragging) if *dragging != id => self.hover = Some(id),
            Some(_) => self.hover = None,
            None => {}
        }
    }

    pub fn leave(&mut self) {
        if self.dragging.is_some() {
            self.hover = None;
        }
    }

    pub fn release(&mut self) -> Option<Gesture> {
        let pending = self.pending.take();
        let hover = self.hover.take();
        match (self.dragging.take(), hover) {
            (Some(source), Some(target)) => Some(Gesture::Drop { source, target }),
            (Some(source), None) => Some(Gesture::Abandon(source)),
            (None, _) => pending.map(|press| Gesture::Click(press.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_motion_is_a_click() {
        let mut tracker = PointerTracker::default();
        tracker.press("a".into(), 10, 10);
        assert_eq!(tracker.motion(13, 15), None);
        assert_eq!(tracker.release(), Some(Gesture::Click("a".into())));
        assert_eq!(tracker.release(), None);
    }

    #[test]
    fn motion_past_threshold_begins_drag_once() {
        let mut tracker = PointerTracker::default();
        tracker.press("a".into(), 0, 0);
        assert_eq!(tracker.motion(6, 0), Some(Gesture::Begin("a".into())));
        assert_eq!(tracker.motion(40, 0), None);
        assert_eq!(tracker.dragging(), Some(&ImageId::new("a")));
    }

    #[test]
    fn release_over_target_drops() {
        let mut tracker = PointerTracker::default();
        tracker.press("a".into(), 0, 0);
        tracker.motion(0, 20);
        tracker.enter("c".into());
        assert_eq!(
            tracker.release(),
            Some(Gesture::Drop {
                source: "a".into(),
                target: "c".into()
            })
        );
        assert!(tracker.dragging().is_none());
    }

    #[test]
    fn hovering_self_or_leaving_abandons() {
        let mut tracker = PointerTracker::default();
        tracker.press("a".into(), 0, 0);
        tracker.motion(0, 20);
        tracker.enter("a".into());
        assert!(tracker.hover().is_none());

        tracker.enter("b".into());
        tracker.leave();
        assert_eq!(tracker.release(), Some(Gesture::Abandon("a".into())));
    }

    #[test]
    fn returning_to_the_dragged_card_abandons() {
        let mut tracker = PointerTracker::default();
        tracker.press("a".into(), 0, 0);
        tracker.motion(0, 20);
        tracker.enter("b".into());
        tracker.enter("a".into());

        assert!(tracker.hover().is_none());
        assert_eq!(tracker.release(), Some(Gesture::Abandon("a".into())));
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let mut tracker = PointerTracker::default();
        tracker.press("a".into(), i32::MIN, 0);
        assert_eq!(
            tracker.motion(i32::MAX, 0),
            Some(Gesture::Begin("a".into()))
        );

        let mut tracker = PointerTracker::default();
        tracker.press("b".into(), i32::MAX, i32::MIN);
        assert_eq!(tracker.motion(i32::MAX - 3, i32::MIN + 2), None);
    }

    #[test]
    fn press_during_drag_is_ignored() {
        let mut tracker = PointerTracker::with_threshold(0);
        tracker.press("a".into(), 0, 0);
        tracker.motion(1, 0);
        tracker.press("b".into(), 5, 5);
        tracker.enter("b".into());
        assert_eq!(
            tracker.release(),
            Some(Gesture::Drop {
                source: "a".into(),
                target: "b".into()
            })
        );
    }
}
