//! Dropshelf Viewer Core
//!
//! Zoom, pan, selection and markup state for a single-page document
//! viewer, plus the channel that mirrors it into a secondary window.

pub mod cancel;
pub mod error;
pub mod markup;
pub mod page_cache;
pub mod render;
pub mod selection;
pub mod sync;
pub mod transform;
pub mod viewer;
pub mod zoom;

#[cfg(test)]
mod testing;

pub use cancel::{resolve_cancel, CancelOutcome, InteractionMode};
pub use error::{ViewerError, ViewerResult};
pub use markup::{MarkupOutcome, MarkupStore, Placement};
pub use page_cache::PageDimensionCache;
pub use render::{PageRequest, RenderEvent, RenderWorker, MAX_SURFACE_EDGE};
pub use selection::{FinalizedSelection, SelectionController, SelectionKind, SelectionState};
pub use sync::{SecondaryViewer, SnapshotSubscriber, ViewerSyncChannel};
pub use transform::{
    document_rect_to_screen, document_to_screen, fit_scale, screen_rect_to_document,
    screen_to_document, PageFrame,
};
pub use viewer::{
    DocumentViewer, HighlightOverlay, LoadState, PageStatus, PointerOutcome, SignatureOverlay,
    TextSource, ThumbnailStatus, ViewerFrame,
};
pub use zoom::{StepBack, ZoomController, DEFAULT_MIN_SELECTION};
