//! Highlight and stamp storage
//!
//! Every markup is stored in page-native coordinates (bottom-left
//! origin) and re-projected through the current transform at render
//! time, so markups move with the page under any zoom or pan.
//!
//! Requests made before a page has been measured are parked together
//! with the transform active at request time and replayed by
//! `resolve_pending` once the page size is known.

use crate::page_cache::PageDimensionCache;
use crate::transform::{screen_rect_to_document, screen_to_document, PageFrame};
use doc_model::{
    Highlight, ImageRef, MarkupId, Point, Rect, Rgb, Signature, Size, ZoomState,
};
use std::collections::BTreeMap;

/// Screen-side context a markup request was made in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub zoom: ZoomState,
    pub viewport: Size,
}

impl Placement {
    pub fn new(zoom: ZoomState, viewport: Size) -> Self {
        Self { zoom, viewport }
    }

    fn frame(&self, page: u32, dimensions: &PageDimensionCache) -> Option<PageFrame> {
        dimensions.get(page).map(|size| PageFrame::fitted(self.viewport, size))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupOutcome {
    Added(MarkupId),
    /// Page not measured yet; the request will be replayed.
    Deferred,
    Rejected,
}

#[derive(Debug, Clone)]
enum PendingRequest {
    Highlight { rect: Rect, color: Rgb, text: Option<String> },
    Signature { image: ImageRef, click: Point },
}

#[derive(Debug, Clone)]
struct PendingMarkup {
    page: u32,
    placement: Placement,
    request: PendingRequest,
}

#[derive(Debug, Clone, Copy)]
struct SignatureDrag {
    id: MarkupId,
    page: u32,
    /// Native offset from the stamp origin to the grab point.
    grab_dx: f32,
    grab_dy: f32,
}

#[derive(Debug, Clone)]
pub struct MarkupStore {
    highlights: BTreeMap<u32, Vec<Highlight>>,
    signatures: BTreeMap<u32, Vec<Signature>>,
    pending: Vec<PendingMarkup>,
    drag: Option<SignatureDrag>,
    signature_size: Size,
}

impl Default for MarkupStore {
    fn default() -> Self {
        Self::new(Size::new(150.0, 50.0))
    }
}

impl MarkupStore {
    pub fn new(signature_size: Size) -> Self {
        Self {
            highlights: BTreeMap::new(),
            signatures: BTreeMap::new(),
            pending: Vec::new(),
            drag: None,
            signature_size,
        }
    }

    pub fn add_highlight(
        &mut self,
        rect: Rect,
        page: u32,
        color: Rgb,
        text: Option<String>,
        placement: Placement,
        dimensions: &PageDimensionCache,
    ) -> MarkupOutcome {
        if rect.size().is_empty() {
            return MarkupOutcome::Rejected;
        }

        let Some(frame) = placement.frame(page, dimensions) else {
            self.defer(page, placement, PendingRequest::Highlight { rect, color, text });
            return MarkupOutcome::Deferred;
        };

        let bounds = screen_rect_to_document(rect, &placement.zoom, &frame);
        let id = MarkupId::new();
        self.highlights.entry(page).or_default().push(Highlight {
            id,
            page,
            bounds,
            color,
            text,
        });

        log::debug!("added highlight {id} on page {page}");
        MarkupOutcome::Added(id)
    }

    /// Places a stamp centered on `click` at the default size.
    pub fn place_signature(
        &mut self,
        image: ImageRef,
        click: Point,
        page: u32,
        placement: Placement,
        dimensions: &PageDimensionCache,
    ) -> MarkupOutcome {
        let Some(frame) = placement.frame(page, dimensions) else {
            self.defer(page, placement, PendingRequest::Signature { image, click });
            return MarkupOutcome::Deferred;
        };

        let center = screen_to_document(click, &placement.zoom, &frame);
        let id = MarkupId::new();
        self.signatures.entry(page).or_default().push(Signature {
            id,
            image,
            page,
            bounds: Rect::centered_at(center, self.signature_size),
        });

        log::debug!("placed signature {id} on page {page}");
        MarkupOutcome::Added(id)
    }

    /// Replays requests parked for `page`. Returns the ids created.
    pub fn resolve_pending(&mut self, page: u32, dimensions: &PageDimensionCache) -> Vec<MarkupId> {
        if !dimensions.contains(page) {
            return Vec::new();
        }

        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|pending| pending.page == page);
        self.pending = waiting;

        let mut created = Vec::new();
        for PendingMarkup { page, placement, request } in ready {
            let outcome = match request {
                PendingRequest::Highlight { rect, color, text } => {
                    self.add_highlight(rect, page, color, text, placement, dimensions)
                }
                PendingRequest::Signature { image, click } => {
                    self.place_signature(image, click, page, placement, dimensions)
                }
            };

            if let MarkupOutcome::Added(id) = outcome {
                created.push(id);
            }
        }

        created
    }

    /// Topmost signature on `page` under the screen point.
    pub fn hit_signature(
        &self,
        page: u32,
        point: Point,
        placement: Placement,
        dimensions: &PageDimensionCache,
    ) -> Option<MarkupId> {
        let frame = placement.frame(page, dimensions)?;
        let native = screen_to_document(point, &placement.zoom, &frame);

        self.signatures
            .get(&page)?
            .iter()
            .rev()
            .find(|signature| signature.bounds.contains(native))
            .map(|signature| signature.id)
    }

    pub fn begin_signature_drag(
        &mut self,
        id: MarkupId,
        point: Point,
        placement: Placement,
        dimensions: &PageDimensionCache,
    ) -> bool {
        let Some(signature) = self.signature(id) else {
            return false;
        };
        let page = signature.page;
        let origin = signature.bounds.origin();

        let Some(frame) = placement.frame(page, dimensions) else {
            return false;
        };
        let native = screen_to_document(point, &placement.zoom, &frame);

        self.drag = Some(SignatureDrag {
            id,
            page,
            grab_dx: native.x - origin.x,
            grab_dy: native.y - origin.y,
        });
        true
    }

    /// Moves the dragged stamp so the grab point follows `point`.
    /// Ignored unless `id` is the stamp currently being dragged.
    pub fn move_signature(
        &mut self,
        id: MarkupId,
        point: Point,
        placement: Placement,
        dimensions: &PageDimensionCache,
    ) -> bool {
        let Some(drag) = self.drag.filter(|drag| drag.id == id) else {
            return false;
        };
        let Some(frame) = placement.frame(drag.page, dimensions) else {
            return false;
        };

        let native = screen_to_document(point, &placement.zoom, &frame);
        let Some(signature) = self.signature_mut(id) else {
            self.drag = None;
            return false;
        };

        signature.bounds.x = native.x - drag.grab_dx;
        signature.bounds.y = native.y - drag.grab_dy;
        true
    }

    pub fn end_signature_drag(&mut self) -> Option<MarkupId> {
        self.drag.take().map(|drag| drag.id)
    }

    pub fn dragging(&self) -> Option<MarkupId> {
        self.drag.map(|drag| drag.id)
    }

    pub fn remove(&mut self, id: MarkupId) -> bool {
        if self.drag.is_some_and(|drag| drag.id == id) {
            self.drag = None;
        }

        for highlights in self.highlights.values_mut() {
            if let Some(index) = highlights.iter().position(|h| h.id == id) {
                highlights.remove(index);
                return true;
            }
        }

        for signatures in self.signatures.values_mut() {
            if let Some(index) = signatures.iter().position(|s| s.id == id) {
                signatures.remove(index);
                return true;
            }
        }

        false
    }

    pub fn clear(&mut self) {
        self.highlights.clear();
        self.signatures.clear();
        self.pending.clear();
        self.drag = None;
    }

    pub fn highlights_on(&self, page: u32) -> &[Highlight] {
        self.highlights.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn signatures_on(&self, page: u32) -> &[Signature] {
        self.signatures.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn highlight(&self, id: MarkupId) -> Option<&Highlight> {
        self.highlights.values().flatten().find(|h| h.id == id)
    }

    pub fn signature(&self, id: MarkupId) -> Option<&Signature> {
        self.signatures.values().flatten().find(|s| s.id == id)
    }

    fn signature_mut(&mut self, id: MarkupId) -> Option<&mut Signature> {
        self.signatures.values_mut().flatten().find(|s| s.id == id)
    }

    pub fn highlight_count(&self) -> usize {
        self.highlights.values().map(Vec::len).sum()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.values().map(Vec::len).sum()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn defer(&mut self, page: u32, placement: Placement, request: PendingRequest) {
        log::debug!("page {page} not measured yet, deferring markup");
        self.pending.push(PendingMarkup { page, placement, request });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::document_rect_to_screen;
    use doc_model::PageSize;

    const VIEWPORT: Size = Size::new(800.0, 600.0);

    fn measured() -> PageDimensionCache {
        let mut cache = PageDimensionCache::new();
        cache.insert(1, PageSize::US_LETTER);
        cache
    }

    fn at_reset() -> Placement {
        Placement::new(ZoomState::RESET, VIEWPORT)
    }

    fn stamp() -> ImageRef {
        ImageRef("stamp.png".to_owned())
    }

    fn added(outcome: MarkupOutcome) -> MarkupId {
        match outcome {
            MarkupOutcome::Added(id) => id,
            other => panic!("expected markup to be added, got {other:?}"),
        }
    }

    #[test]
    fn highlight_follows_page_under_new_zoom() {
        let dims = measured();
        let mut store = MarkupStore::default();
        let z1 = ZoomState::new(2.0, -40.0, 25.0);
        let rect = Rect::new(300.0, 200.0, 120.0, 30.0);

        let id = added(store.add_highlight(
            rect,
            1,
            Rgb::YELLOW,
            Some("quarterly".to_owned()),
            Placement::new(z1, VIEWPORT),
            &dims,
        ));

        let frame = PageFrame::fitted(VIEWPORT, PageSize::US_LETTER);
        let stored = store.highlight(id).expect("highlight stored").bounds;

        let under_z1 = document_rect_to_screen(stored, &z1, &frame);
        assert!((under_z1.x - rect.x).abs() < 1e-2);
        assert!((under_z1.width - rect.width).abs() < 1e-2);

        let z2 = ZoomState::new(3.0, 10.0, -5.0);
        let under_z2 = document_rect_to_screen(stored, &z2, &frame);
        assert!((under_z2.width - rect.width * 1.5).abs() < 1e-2);
        assert!((under_z2.height - rect.height * 1.5).abs() < 1e-2);
    }

    #[test]
    fn signature_is_centered_on_click() {
        let dims = measured();
        let mut store = MarkupStore::new(Size::new(100.0, 40.0));
        let click = Point::new(400.0, 300.0);

        let id = added(store.place_signature(stamp(), click, 1, at_reset(), &dims));
        let bounds = store.signature(id).expect("signature stored").bounds;

        assert!((bounds.center().x - 306.0).abs() < 1e-3);
        assert!((bounds.center().y - 396.0).abs() < 1e-3);
        assert_eq!(bounds.size(), Size::new(100.0, 40.0));
    }

    #[test]
    fn unmeasured_page_defers_until_dimensions_arrive() {
        let mut dims = PageDimensionCache::new();
        let mut store = MarkupStore::default();

        let outcome = store.add_highlight(
            Rect::new(100.0, 100.0, 80.0, 20.0),
            3,
            Rgb::PINK,
            None,
            at_reset(),
            &dims,
        );
        assert_eq!(outcome, MarkupOutcome::Deferred);
        assert_eq!(store.highlight_count(), 0);
        assert_eq!(store.pending_count(), 1);

        assert!(store.resolve_pending(3, &dims).is_empty());

        dims.insert(3, PageSize::US_LETTER);
        let created = store.resolve_pending(3, &dims);
        assert_eq!(created.len(), 1);
        assert_eq!(store.highlights_on(3).len(), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn drag_keeps_grab_point_under_pointer() {
        let dims = measured();
        let mut store = MarkupStore::default();
        let placement = at_reset();

        let id = added(store.place_signature(stamp(), Point::new(400.0, 300.0), 1, placement, &dims));
        let before = store.signature(id).expect("stored").bounds;

        assert_eq!(store.hit_signature(1, Point::new(405.0, 302.0), placement, &dims), Some(id));
        assert!(store.begin_signature_drag(id, Point::new(405.0, 302.0), placement, &dims));
        assert!(store.move_signature(id, Point::new(455.0, 302.0), placement, &dims));
        assert_eq!(store.end_signature_drag(), Some(id));

        let after = store.signature(id).expect("stored").bounds;
        let frame = PageFrame::fitted(VIEWPORT, PageSize::US_LETTER);
        let expected_dx = 50.0 * frame.native_per_rendered();

        assert!((after.x - before.x - expected_dx).abs() < 1e-3);
        assert!((after.y - before.y).abs() < 1e-3);
        assert_eq!(after.size(), before.size());
    }

    #[test]
    fn move_without_drag_flag_is_ignored() {
        let dims = measured();
        let mut store = MarkupStore::default();
        let id = added(store.place_signature(stamp(), Point::new(400.0, 300.0), 1, at_reset(), &dims));
        let before = store.signature(id).cloned();

        assert!(!store.move_signature(id, Point::new(10.0, 10.0), at_reset(), &dims));
        assert_eq!(store.signature(id).cloned(), before);
    }

    #[test]
    fn highlights_are_scoped_to_their_page() {
        let mut dims = measured();
        dims.insert(2, PageSize::US_LETTER);
        let mut store = MarkupStore::default();

        let rect = Rect::new(100.0, 100.0, 80.0, 20.0);
        store.add_highlight(rect, 1, Rgb::YELLOW, None, at_reset(), &dims);
        store.add_highlight(rect, 2, Rgb::GREEN, None, at_reset(), &dims);

        assert_eq!(store.highlights_on(1).len(), 1);
        assert_eq!(store.highlights_on(2)[0].color, Rgb::GREEN);
        assert!(store.highlights_on(5).is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let dims = measured();
        let mut store = MarkupStore::default();

        let highlight = added(store.add_highlight(
            Rect::new(100.0, 100.0, 80.0, 20.0),
            1,
            Rgb::YELLOW,
            None,
            at_reset(),
            &dims,
        ));
        let signature =
            added(store.place_signature(stamp(), Point::new(200.0, 200.0), 1, at_reset(), &dims));

        assert!(store.remove(highlight));
        assert!(!store.remove(highlight));
        assert_eq!(store.highlight_count(), 0);
        assert_eq!(store.signature_count(), 1);

        store.clear();
        assert!(store.signature(signature).is_none());
    }
}
