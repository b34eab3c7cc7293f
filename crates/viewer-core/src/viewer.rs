//! The primary document viewer.
//!
//! `DocumentViewer` owns every piece of interactive state (zoom,
//! selection, markups, measured page sizes) and mutates it serially from
//! pointer and keyboard calls. Rendering happens on the worker thread;
//! `poll` and `wait_idle` fold its results back in.

use crate::cancel::{resolve_cancel, CancelOutcome, InteractionMode};
use crate::error::{ViewerError, ViewerResult};
use crate::markup::{MarkupOutcome, MarkupStore, Placement};
use crate::page_cache::PageDimensionCache;
use crate::render::{PageRequest, RenderEvent, RenderWorker};
use crate::selection::{SelectionController, SelectionKind};
use crate::sync::{SecondaryViewer, ViewerSyncChannel};
use crate::transform::{document_rect_to_screen, screen_rect_to_document, PageFrame};
use crate::zoom::{StepBack, ZoomController};
use doc_model::{
    ContentRef, ImageRef, MarkupId, PageSize, Point, Rect, Rgb, Size, ViewerSettings,
    ViewerSnapshot, ZoomState,
};
use pdf_engine::{OpenSource, PageRasterizer, Surface};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Supplies the text lying under a highlight, in page-native bounds.
pub trait TextSource {
    fn text_in(&self, page: u32, bounds: Rect) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Opening,
    Ready { page_count: u32 },
    Failed { reason: String },
}

#[derive(Debug)]
pub enum PageStatus {
    Loading,
    Ready { surface: Surface, render_scale: f32 },
    Failed { reason: String },
}

impl PageStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

#[derive(Debug)]
pub enum ThumbnailStatus {
    Loading,
    Ready(Surface),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    Ignored,
    /// A drag, pan or stamp move is in progress.
    Tracking,
    Zoomed,
    /// The drag was too small, or the zoom could not be applied.
    Discarded,
    Markup(MarkupOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightOverlay {
    pub id: MarkupId,
    pub rect: Rect,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureOverlay {
    pub id: MarkupId,
    pub rect: Rect,
    pub image: ImageRef,
}

/// Everything a renderer needs to draw one frame of the viewer.
#[derive(Debug)]
pub struct ViewerFrame<'a> {
    pub load_state: &'a LoadState,
    pub page: u32,
    pub page_count: u32,
    pub page_status: Option<&'a PageStatus>,
    pub mode: &'a InteractionMode,
    pub zoom: ZoomState,
    /// On-screen page rectangle; `None` until the page is measured.
    pub page_rect: Option<Rect>,
    pub selection: Option<Rect>,
    pub highlights: Vec<HighlightOverlay>,
    pub signatures: Vec<SignatureOverlay>,
}

#[derive(Debug, Clone)]
struct OpenDocumentInfo {
    content_ref: ContentRef,
    file_name: String,
    page_count: u32,
}

#[derive(Debug, Clone, Copy)]
enum PointerDrag {
    Pan { last: Point },
    Signature(MarkupId),
}

pub struct DocumentViewer {
    settings: ViewerSettings,
    viewport: Size,
    worker: RenderWorker,
    sync: ViewerSyncChannel,
    text_source: Option<Box<dyn TextSource>>,

    load_state: LoadState,
    document: Option<OpenDocumentInfo>,
    page: u32,
    pages: HashMap<u32, PageStatus>,
    thumbnails: HashMap<u32, ThumbnailStatus>,
    last_request: Option<PageRequest>,

    mode: InteractionMode,
    zoom: ZoomController,
    selection: SelectionController,
    markups: MarkupStore,
    dimensions: PageDimensionCache,
    drag: Option<PointerDrag>,
}

impl DocumentViewer {
    pub fn new(
        rasterizer: Box<dyn PageRasterizer>,
        viewport: Size,
        settings: ViewerSettings,
    ) -> ViewerResult<Self> {
        let worker = RenderWorker::spawn(rasterizer)?;

        Ok(Self {
            zoom: ZoomController::with_min_selection(settings.min_selection_size),
            selection: SelectionController::new(settings.min_selection_size),
            markups: MarkupStore::new(settings.signature_size),
            settings,
            viewport,
            worker,
            sync: ViewerSyncChannel::new(),
            text_source: None,
            load_state: LoadState::Idle,
            document: None,
            page: 1,
            pages: HashMap::new(),
            thumbnails: HashMap::new(),
            last_request: None,
            mode: InteractionMode::Browse,
            dimensions: PageDimensionCache::new(),
            drag: None,
        })
    }

    pub fn with_text_source(mut self, source: Box<dyn TextSource>) -> Self {
        self.text_source = Some(source);
        self
    }

    /// Starts loading a document, replacing any open one. The result
    /// arrives through `poll` or `wait_idle`.
    pub fn open_document(
        &mut self,
        content_ref: ContentRef,
        file_name: impl Into<String>,
    ) -> ViewerResult<()> {
        if self.document.is_some() {
            self.close_document()?;
        }

        let file_name = file_name.into();
        log::info!("opening {file_name}");

        self.worker.open(OpenSource::from(&content_ref))?;
        self.document = Some(OpenDocumentInfo { content_ref, file_name, page_count: 0 });
        self.load_state = LoadState::Opening;
        Ok(())
    }

    /// Closes the document and forgets all state tied to it. Local state
    /// is discarded even when the worker can no longer be reached.
    pub fn close_document(&mut self) -> ViewerResult<()> {
        if let Some(document) = self.document.take() {
            log::info!("closing {}", document.file_name);
        }

        self.load_state = LoadState::Idle;
        self.page = 1;
        self.pages.clear();
        self.thumbnails.clear();
        self.last_request = None;
        self.mode = InteractionMode::Browse;
        self.zoom.reset();
        self.selection.cancel();
        self.markups.clear();
        self.dimensions.invalidate();
        self.drag = None;

        self.worker.close()
    }

    /// Applies every render result that has already arrived.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.worker.try_next() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks until all outstanding render work is answered or `timeout`
    /// passes. Returns `true` when nothing is left in flight.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.worker.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            if let Some(event) = self.worker.next_timeout(remaining) {
                self.apply(event);
            }
        }

        self.worker.in_flight() == 0
    }

    fn apply(&mut self, event: RenderEvent) -> bool {
        if event.generation() != self.worker.generation() {
            log::warn!("dropping stale render result from generation {}", event.generation());
            return false;
        }

        match event {
            RenderEvent::Opened { page_count, .. } => {
                let Some(document) = self.document.as_mut() else {
                    return false;
                };
                document.page_count = page_count;
                log::info!("opened {} ({page_count} pages)", document.file_name);

                self.load_state = LoadState::Ready { page_count };
                self.page = 1;
                self.request_page(true);
                self.publish_snapshot();
            }
            RenderEvent::OpenFailed { reason, .. } => {
                log::warn!("failed to open document: {reason}");
                self.load_state = LoadState::Failed { reason };
            }
            RenderEvent::PageRendered { page, page_size, scale, surface, .. } => {
                if self.dimensions.insert(page, page_size) {
                    let created = self.markups.resolve_pending(page, &self.dimensions);
                    if !created.is_empty() {
                        log::debug!("placed {} deferred markups on page {page}", created.len());
                    }
                }

                if page == self.page {
                    self.pages.insert(page, PageStatus::Ready { surface, render_scale: scale });
                }
            }
            RenderEvent::PageFailed { page, reason, .. } => {
                log::warn!("failed to render page {page}: {reason}");
                if page == self.page {
                    self.pages.insert(page, PageStatus::Failed { reason });
                }
            }
            RenderEvent::ThumbnailRendered { page, surface, .. } => {
                self.thumbnails.insert(page, ThumbnailStatus::Ready(surface));
            }
            RenderEvent::ThumbnailFailed { page, reason, .. } => {
                log::warn!("failed to render thumbnail for page {page}: {reason}");
                self.thumbnails.insert(page, ThumbnailStatus::Failed { reason });
            }
        }

        true
    }

    /// Moves to `page` (1-based, clamped). Returns `true` if the page changed.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        let page_count = self.page_count();
        if page_count == 0 {
            return false;
        }

        let target = page.clamp(1, page_count);
        if target == self.page {
            return false;
        }

        log::debug!("page {} -> {target}", self.page);
        self.page = target;
        self.zoom.reset();
        self.selection.cancel();
        self.end_drag();
        self.request_page(false);
        self.publish_snapshot();
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_sub(1))
    }

    /// Re-requests the current page, e.g. after a render failure.
    pub fn reload_page(&mut self) -> bool {
        self.request_page(true)
    }

    pub fn request_thumbnail(&mut self, page: u32) -> ViewerResult<()> {
        let page_count = self.page_count();
        if page_count == 0 {
            return Err(ViewerError::NoDocument);
        }

        let page = page.clamp(1, page_count);
        self.worker.request_thumbnail(page, self.settings.thumbnail_edge_px)?;
        self.thumbnails.insert(page, ThumbnailStatus::Loading);
        Ok(())
    }

    pub fn resize(&mut self, viewport: Size) {
        if viewport == self.viewport {
            return;
        }

        self.viewport = viewport;
        self.request_page(false);
    }

    /// Switches interaction mode, dropping any half-finished gesture.
    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.selection.cancel();
        self.end_drag();
        self.mode = mode;
    }

    pub fn cancel(&mut self) -> CancelOutcome {
        let outcome = resolve_cancel(&mut self.selection, &mut self.zoom, &mut self.mode);
        log::debug!("cancel: {outcome:?}");

        match outcome {
            CancelOutcome::ZoomSteppedBack | CancelOutcome::ZoomReset => {
                self.request_page(false);
            }
            CancelOutcome::ModeExited => self.end_drag(),
            CancelOutcome::SelectionAborted | CancelOutcome::Ignored => {}
        }

        outcome
    }

    pub fn step_back(&mut self) -> StepBack {
        let outcome = self.zoom.step_back();
        if outcome != StepBack::Unchanged {
            self.request_page(false);
        }
        outcome
    }

    pub fn reset_zoom(&mut self) {
        self.zoom.reset();
        self.request_page(false);
    }

    pub fn pointer_down(&mut self, point: Point) -> PointerOutcome {
        if !self.is_ready() || self.drag.is_some() {
            return PointerOutcome::Ignored;
        }

        match self.mode.clone() {
            InteractionMode::Browse => {
                let placement = self.placement();
                if let Some(id) =
                    self.markups.hit_signature(self.page, point, placement, &self.dimensions)
                {
                    if self.markups.begin_signature_drag(id, point, placement, &self.dimensions) {
                        self.drag = Some(PointerDrag::Signature(id));
                        return PointerOutcome::Tracking;
                    }
                }

                if self.zoom.current().can_pan() {
                    self.drag = Some(PointerDrag::Pan { last: point });
                    return PointerOutcome::Tracking;
                }

                PointerOutcome::Ignored
            }
            InteractionMode::ZoomSelect => self.begin_selection(SelectionKind::Zoom, point),
            InteractionMode::Highlight => self.begin_selection(SelectionKind::Highlight, point),
            InteractionMode::PlaceStamp(stamp) => {
                let outcome = self.markups.place_signature(
                    stamp.image,
                    point,
                    self.page,
                    self.placement(),
                    &self.dimensions,
                );
                PointerOutcome::Markup(outcome)
            }
        }
    }

    pub fn pointer_move(&mut self, point: Point) -> PointerOutcome {
        match self.drag {
            Some(PointerDrag::Pan { last }) => {
                self.zoom.pan(point.x - last.x, point.y - last.y);
                self.drag = Some(PointerDrag::Pan { last: point });
                PointerOutcome::Tracking
            }
            Some(PointerDrag::Signature(id)) => {
                // Unmeasured pages leave the stamp in place; the next move retries.
                self.markups.move_signature(id, point, self.placement(), &self.dimensions);
                PointerOutcome::Tracking
            }
            None if self.selection.update(point) => PointerOutcome::Tracking,
            None => PointerOutcome::Ignored,
        }
    }

    pub fn pointer_up(&mut self, point: Point) -> PointerOutcome {
        if let Some(drag) = self.drag.take() {
            match drag {
                PointerDrag::Pan { last } => {
                    self.zoom.pan(point.x - last.x, point.y - last.y);
                }
                PointerDrag::Signature(id) => {
                    self.markups.move_signature(id, point, self.placement(), &self.dimensions);
                    self.markups.end_signature_drag();
                }
            }
            return PointerOutcome::Tracking;
        }

        if !self.selection.is_dragging() {
            return PointerOutcome::Ignored;
        }

        if !self.selection.release(point) {
            return PointerOutcome::Discarded;
        }

        let Some(finalized) = self.selection.take_finalized() else {
            return PointerOutcome::Discarded;
        };

        match finalized.kind {
            SelectionKind::Zoom => {
                let frame = self.zoom_frame();
                if self.zoom.zoom_to_selection(finalized.rect, &frame) {
                    self.request_page(false);
                    PointerOutcome::Zoomed
                } else {
                    PointerOutcome::Discarded
                }
            }
            SelectionKind::Highlight => {
                let text = self.text_under(finalized.rect);
                let outcome = self.markups.add_highlight(
                    finalized.rect,
                    self.page,
                    self.settings.highlight_color,
                    text,
                    self.placement(),
                    &self.dimensions,
                );
                PointerOutcome::Markup(outcome)
            }
        }
    }

    pub fn remove_markup(&mut self, id: MarkupId) -> bool {
        if matches!(self.drag, Some(PointerDrag::Signature(dragged)) if dragged == id) {
            self.drag = None;
        }
        self.markups.remove(id)
    }

    pub fn clear_markups(&mut self) {
        if matches!(self.drag, Some(PointerDrag::Signature(_))) {
            self.drag = None;
        }
        self.markups.clear();
    }

    /// Opens the mirror window. When one is already open the latest
    /// snapshot is delivered to it again and `None` is returned.
    pub fn open_secondary_viewer(&mut self) -> Option<SecondaryViewer> {
        match self.sync.subscribe() {
            Some(subscriber) => Some(SecondaryViewer::new(
                subscriber,
                ZoomController::with_min_selection(self.settings.min_selection_size),
            )),
            None => {
                self.sync.republish();
                None
            }
        }
    }

    /// Channel handle for mirrors living on another thread.
    pub fn sync_channel(&self) -> ViewerSyncChannel {
        self.sync.clone()
    }

    pub fn snapshot(&self) -> Option<ViewerSnapshot> {
        let document = self.document.as_ref()?;
        if !self.is_ready() {
            return None;
        }

        Some(ViewerSnapshot {
            content_ref: document.content_ref.clone(),
            page: self.page,
            page_count: document.page_count,
            file_name: document.file_name.clone(),
        })
    }

    fn publish_snapshot(&self) {
        if let Some(snapshot) = self.snapshot() {
            self.sync.publish(snapshot);
        }
    }

    pub fn view(&self) -> ViewerFrame<'_> {
        let zoom = self.zoom.current();
        let frame = self.page_frame();

        let (highlights, signatures) = match frame.as_ref() {
            Some(frame) => (
                self.markups
                    .highlights_on(self.page)
                    .iter()
                    .map(|highlight| HighlightOverlay {
                        id: highlight.id,
                        rect: document_rect_to_screen(highlight.bounds, &zoom, frame),
                        color: highlight.color,
                    })
                    .collect(),
                self.markups
                    .signatures_on(self.page)
                    .iter()
                    .map(|signature| SignatureOverlay {
                        id: signature.id,
                        rect: document_rect_to_screen(signature.bounds, &zoom, frame),
                        image: signature.image.clone(),
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        ViewerFrame {
            load_state: &self.load_state,
            page: self.page,
            page_count: self.page_count(),
            page_status: self.pages.get(&self.page),
            mode: &self.mode,
            zoom,
            page_rect: frame.map(|frame| frame.page_rect(&zoom)),
            selection: self.selection.live_rect(),
            highlights,
            signatures,
        }
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.load_state, LoadState::Ready { .. })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        match self.load_state {
            LoadState::Ready { page_count } => page_count,
            _ => 0,
        }
    }

    pub fn page_status(&self) -> Option<&PageStatus> {
        self.pages.get(&self.page)
    }

    pub fn thumbnail(&self, page: u32) -> Option<&ThumbnailStatus> {
        self.thumbnails.get(&page)
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn markups(&self) -> &MarkupStore {
        &self.markups
    }

    pub fn dimensions(&self) -> &PageDimensionCache {
        &self.dimensions
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    fn placement(&self) -> Placement {
        Placement::new(self.zoom.current(), self.viewport)
    }

    fn page_frame(&self) -> Option<PageFrame> {
        self.dimensions.get(self.page).map(|size| PageFrame::fitted(self.viewport, size))
    }

    /// Zoom math does not depend on the page size, so an unmeasured page
    /// can still be zoomed using any stand-in size.
    fn zoom_frame(&self) -> PageFrame {
        self.page_frame()
            .unwrap_or_else(|| PageFrame::fitted(self.viewport, PageSize::default()))
    }

    fn text_under(&self, rect: Rect) -> Option<String> {
        let source = self.text_source.as_ref()?;
        let frame = self.page_frame()?;
        let bounds = screen_rect_to_document(rect, &self.zoom.current(), &frame);
        source.text_in(self.page, bounds)
    }

    fn begin_selection(&mut self, kind: SelectionKind, point: Point) -> PointerOutcome {
        if self.selection.begin(kind, point) {
            PointerOutcome::Tracking
        } else {
            PointerOutcome::Ignored
        }
    }

    fn end_drag(&mut self) {
        if matches!(self.drag.take(), Some(PointerDrag::Signature(_))) {
            self.markups.end_signature_drag();
        }
    }

    /// Asks the worker for the current page at the current zoom unless
    /// that exact render was the last one requested.
    fn request_page(&mut self, force: bool) -> bool {
        if !self.is_ready() {
            return false;
        }

        let request = PageRequest {
            page: self.page,
            viewport: self.viewport,
            zoom_scale: self.zoom.current().scale,
            device_pixel_ratio: self.settings.device_pixel_ratio,
        };
        if !force && self.last_request == Some(request) {
            return false;
        }

        if let Err(error) = self.worker.request_page(request) {
            log::warn!("could not request page {}: {error}", self.page);
            self.pages.insert(self.page, PageStatus::Failed { reason: error.to_string() });
            return false;
        }

        self.last_request = Some(request);
        if !self.pages.get(&self.page).is_some_and(PageStatus::is_ready) {
            self.pages.insert(self.page, PageStatus::Loading);
        }
        true
    }
}
