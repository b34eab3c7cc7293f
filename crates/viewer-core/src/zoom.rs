//! Zoom-to-selection with LIFO undo.

use crate::transform::{document_to_screen, screen_to_document, PageFrame};
use doc_model::{Rect, ZoomState};

pub const DEFAULT_MIN_SELECTION: f32 = 10.0;

/// What a single `step_back` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBack {
    /// Popped the previous transform off the history.
    Restored,
    /// History was empty; jumped straight to the reset transform.
    Reset,
    /// Already at reset with nothing to undo.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct ZoomController {
    current: ZoomState,
    history: Vec<ZoomState>,
    min_selection: f32,
}

impl Default for ZoomController {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoomController {
    pub fn new() -> Self {
        Self::with_min_selection(DEFAULT_MIN_SELECTION)
    }

    pub fn with_min_selection(min_selection: f32) -> Self {
        Self { current: ZoomState::RESET, history: Vec::new(), min_selection }
    }

    pub fn current(&self) -> ZoomState {
        self.current
    }

    pub fn history(&self) -> &[ZoomState] {
        &self.history
    }

    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    pub fn min_selection(&self) -> f32 {
        self.min_selection
    }

    /// Replaces the current transform without recording history.
    pub fn set_current(&mut self, state: ZoomState) {
        self.current = state;
    }

    /// Zooms so that `selection` (screen space) fills the viewport and is
    /// centered in it. Returns `false` and leaves everything untouched
    /// when the selection is too small on either axis.
    pub fn zoom_to_selection(&mut self, selection: Rect, frame: &PageFrame) -> bool {
        if !selection.exceeds(self.min_selection) {
            log::debug!(
                "ignoring zoom selection {:.1}x{:.1} below minimum {:.1}",
                selection.width,
                selection.height,
                self.min_selection
            );
            return false;
        }

        let viewport = frame.viewport;
        if viewport.is_empty() {
            return false;
        }

        let previous = self.current;
        let target = screen_to_document(selection.center(), &previous, frame);

        let fit = (viewport.width / selection.width).min(viewport.height / selection.height);
        let scale = previous.scale * fit;

        let unpanned = ZoomState::new(scale, 0.0, 0.0);
        let projected = document_to_screen(target, &unpanned, frame);
        let center = viewport.center();

        self.history.push(previous);
        self.current = ZoomState::new(scale, center.x - projected.x, center.y - projected.y);

        log::debug!(
            "zoomed to scale {:.3} (history depth {})",
            self.current.scale,
            self.history.len()
        );

        true
    }

    pub fn step_back(&mut self) -> StepBack {
        if let Some(previous) = self.history.pop() {
            self.current = previous;
            return StepBack::Restored;
        }

        if !self.current.is_reset() {
            self.current = ZoomState::RESET;
            return StepBack::Reset;
        }

        StepBack::Unchanged
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.current = ZoomState::RESET;
    }

    /// Shifts the pan offset. Only allowed while zoomed in; no clamping.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) -> bool {
        if !self.current.can_pan() {
            return false;
        }

        self.current.offset_x += delta_x;
        self.current.offset_y += delta_y;
        true
    }
}
