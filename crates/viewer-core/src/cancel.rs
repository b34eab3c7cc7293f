//! Escape/back handling.
//!
//! A cancel signal fires exactly one of, in order:
//! 1. abort the in-progress drag selection
//! 2. pop one zoom history entry
//! 3. reset a zoom that has no history left
//! 4. leave the current interaction mode

use crate::selection::SelectionController;
use crate::zoom::{StepBack, ZoomController};
use doc_model::Stamp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionMode {
    /// Drag pans while zoomed in; pressing a placed stamp drags it.
    Browse,
    ZoomSelect,
    Highlight,
    PlaceStamp(Stamp),
}

impl InteractionMode {
    pub fn is_browse(&self) -> bool {
        matches!(self, Self::Browse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    SelectionAborted,
    ZoomSteppedBack,
    ZoomReset,
    ModeExited,
    Ignored,
}

pub fn resolve_cancel(
    selection: &mut SelectionController,
    zoom: &mut ZoomController,
    mode: &mut InteractionMode,
) -> CancelOutcome {
    if selection.cancel() {
        return CancelOutcome::SelectionAborted;
    }

    match zoom.step_back() {
        StepBack::Restored => return CancelOutcome::ZoomSteppedBack,
        StepBack::Reset => return CancelOutcome::ZoomReset,
        StepBack::Unchanged => {}
    }

    if !mode.is_browse() {
        *mode = InteractionMode::Browse;
        return CancelOutcome::ModeExited;
    }

    CancelOutcome::Ignored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionKind;
    use crate::transform::PageFrame;
    use doc_model::{PageSize, Point, Rect, Size, ZoomState};

    fn zoomed_twice() -> ZoomController {
        let frame = PageFrame::fitted(Size::new(800.0, 600.0), PageSize::US_LETTER);
        let mut zoom = ZoomController::new();
        zoom.zoom_to_selection(Rect::new(100.0, 100.0, 200.0, 150.0), &frame);
        zoom.zoom_to_selection(Rect::new(100.0, 100.0, 200.0, 150.0), &frame);
        zoom
    }

    #[test]
    fn cancels_fire_one_branch_at_a_time_in_priority_order() {
        let mut selection = SelectionController::new(10.0);
        let mut zoom = zoomed_twice();
        let mut mode = InteractionMode::ZoomSelect;

        selection.begin(SelectionKind::Zoom, Point::new(10.0, 10.0));

        let outcomes: Vec<_> =
            (0..5).map(|_| resolve_cancel(&mut selection, &mut zoom, &mut mode)).collect();

        assert_eq!(
            outcomes,
            vec![
                CancelOutcome::SelectionAborted,
                CancelOutcome::ZoomSteppedBack,
                CancelOutcome::ZoomSteppedBack,
                CancelOutcome::ModeExited,
                CancelOutcome::Ignored,
            ]
        );
        assert_eq!(mode, InteractionMode::Browse);
        assert_eq!(zoom.current(), ZoomState::RESET);
    }

    #[test]
    fn zoom_without_history_resets_before_leaving_mode() {
        let mut selection = SelectionController::new(10.0);
        let mut zoom = ZoomController::new();
        zoom.set_current(ZoomState::new(2.0, 15.0, 0.0));
        let mut mode = InteractionMode::Highlight;

        assert_eq!(resolve_cancel(&mut selection, &mut zoom, &mut mode), CancelOutcome::ZoomReset);
        assert_eq!(mode, InteractionMode::Highlight);
        assert_eq!(resolve_cancel(&mut selection, &mut zoom, &mut mode), CancelOutcome::ModeExited);
    }

    #[test]
    fn aborting_a_drag_leaves_zoom_alone() {
        let mut selection = SelectionController::new(10.0);
        let mut zoom = zoomed_twice();
        let before = zoom.current();
        let mut mode = InteractionMode::ZoomSelect;

        selection.begin(SelectionKind::Zoom, Point::new(0.0, 0.0));
        resolve_cancel(&mut selection, &mut zoom, &mut mode);

        assert_eq!(zoom.current(), before);
        assert_eq!(zoom.history_depth(), 2);
    }
}
