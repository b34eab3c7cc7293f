//! Pointer-drag selection state machine
//!
//! ```text
//! Idle --begin--> Dragging --update--> Dragging
//! Dragging --release(big enough)--> Finalizing --take_finalized--> Idle
//! Dragging --release(too small)--> Idle
//! Dragging | Finalizing --cancel--> Idle
//! ```
//!
//! A drag can only start from `Idle`, so at most one selection exists.

use doc_model::{Point, Rect};

/// Consumer of a finalized selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Zoom,
    Highlight,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState {
    Idle,
    Dragging { kind: SelectionKind, start: Point, end: Point },
    Finalizing { kind: SelectionKind, rect: Rect },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalizedSelection {
    pub kind: SelectionKind,
    /// Screen-space rectangle.
    pub rect: Rect,
}

#[derive(Debug, Clone)]
pub struct SelectionController {
    state: SelectionState,
    min_size: f32,
}

impl SelectionController {
    pub fn new(min_size: f32) -> Self {
        Self { state: SelectionState::Idle, min_size }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, SelectionState::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SelectionState::Dragging { .. })
    }

    /// Rectangle to draw while the pointer is down.
    pub fn live_rect(&self) -> Option<Rect> {
        match self.state {
            SelectionState::Dragging { start, end, .. } => Some(Rect::from_corners(start, end)),
            _ => None,
        }
    }

    pub fn begin(&mut self, kind: SelectionKind, point: Point) -> bool {
        if !self.is_idle() {
            return false;
        }

        self.state = SelectionState::Dragging { kind, start: point, end: point };
        true
    }

    pub fn update(&mut self, point: Point) -> bool {
        match &mut self.state {
            SelectionState::Dragging { end, .. } => {
                *end = point;
                true
            }
            _ => false,
        }
    }

    /// Ends the drag at `point`. Returns `true` when a selection is now
    /// waiting in `Finalizing`; undersized drags fall back to `Idle`.
    pub fn release(&mut self, point: Point) -> bool {
        let SelectionState::Dragging { kind, start, .. } = self.state else {
            return false;
        };

        let rect = Rect::from_corners(start, point);

        if rect.exceeds(self.min_size) {
            self.state = SelectionState::Finalizing { kind, rect };
            true
        } else {
            log::debug!("discarding {:.1}x{:.1} selection", rect.width, rect.height);
            self.state = SelectionState::Idle;
            false
        }
    }

    pub fn take_finalized(&mut self) -> Option<FinalizedSelection> {
        let SelectionState::Finalizing { kind, rect } = self.state else {
            return None;
        };

        self.state = SelectionState::Idle;
        Some(FinalizedSelection { kind, rect })
    }

    /// Drops any in-progress or unconsumed selection.
    pub fn cancel(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }

        self.state = SelectionState::Idle;
        true
    }
}
