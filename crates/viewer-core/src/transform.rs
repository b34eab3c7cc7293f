//! Screen ⇄ page-native coordinate conversion
//!
//! The page is laid out fitted and centered in the viewport at zoom 1.
//! The zoom transform scales around that visual center and then
//! translates by the pan offset:
//!
//! ```text
//! screen = viewport_center + offset + scale * local
//! native = page_center + (local.x, -local.y) * (native_width / rendered_width)
//! ```
//!
//! `local` is measured in rendered-page units from the page center.
//! Page-native space has its origin at the bottom-left corner with Y
//! increasing upward, so the vertical axis flips in the second step.

use doc_model::{PageSize, Point, Rect, Size, ZoomState};

/// Geometry needed to project between screen and page space for a
/// single page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub viewport: Size,
    pub page: PageSize,
    /// Width of the page on screen at zoom 1.
    pub rendered_width: f32,
}

impl PageFrame {
    /// Frame for a page fitted into the viewport.
    pub fn fitted(viewport: Size, page: PageSize) -> Self {
        Self { viewport, page, rendered_width: page.width_pt * fit_scale(viewport, page) }
    }

    pub fn with_rendered_width(viewport: Size, page: PageSize, rendered_width: f32) -> Self {
        Self { viewport, page, rendered_width }
    }

    /// Native page units per rendered unit.
    pub fn native_per_rendered(&self) -> f32 {
        if self.rendered_width <= 0.0 {
            return 1.0;
        }

        self.page.width_pt / self.rendered_width
    }

    /// The page's on-screen rectangle under `zoom`.
    pub fn page_rect(&self, zoom: &ZoomState) -> Rect {
        let top_left = document_to_screen(Point::new(0.0, self.page.height_pt), zoom, self);
        let bottom_right = document_to_screen(Point::new(self.page.width_pt, 0.0), zoom, self);

        Rect::from_corners(top_left, bottom_right)
    }
}

/// Scale that fits the whole page inside the viewport.
pub fn fit_scale(viewport: Size, page: PageSize) -> f32 {
    if viewport.is_empty() || page.width_pt <= 0.0 || page.height_pt <= 0.0 {
        return 1.0;
    }

    let width = viewport.width / page.width_pt;
    let height = viewport.height / page.height_pt;

    width.min(height)
}

pub fn screen_to_document(point: Point, zoom: &ZoomState, frame: &PageFrame) -> Point {
    let center = frame.viewport.center();
    let local_x = (point.x - center.x - zoom.offset_x) / zoom.scale;
    let local_y = (point.y - center.y - zoom.offset_y) / zoom.scale;

    let ratio = frame.native_per_rendered();

    Point::new(
        frame.page.width_pt / 2.0 + local_x * ratio,
        frame.page.height_pt / 2.0 - local_y * ratio,
    )
}

pub fn document_to_screen(point: Point, zoom: &ZoomState, frame: &PageFrame) -> Point {
    let ratio = frame.native_per_rendered();
    let local_x = (point.x - frame.page.width_pt / 2.0) / ratio;
    let local_y = (frame.page.height_pt / 2.0 - point.y) / ratio;

    let center = frame.viewport.center();

    Point::new(
        center.x + zoom.offset_x + local_x * zoom.scale,
        center.y + zoom.offset_y + local_y * zoom.scale,
    )
}

/// Converts a screen rectangle into a native rectangle whose origin is
/// its bottom-left corner.
pub fn screen_rect_to_document(rect: Rect, zoom: &ZoomState, frame: &PageFrame) -> Rect {
    let a = screen_to_document(rect.origin(), zoom, frame);
    let b = screen_to_document(rect.far_corner(), zoom, frame);

    Rect::from_corners(a, b)
}

pub fn document_rect_to_screen(rect: Rect, zoom: &ZoomState, frame: &PageFrame) -> Rect {
    let a = document_to_screen(rect.origin(), zoom, frame);
    let b = document_to_screen(rect.far_corner(), zoom, frame);

    Rect::from_corners(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f32 = 1e-3;

    fn letter_frame() -> PageFrame {
        PageFrame::fitted(Size::new(800.0, 600.0), PageSize::US_LETTER)
    }

    fn assert_close(a: Point, b: Point, tolerance: f32) {
        assert!(
            (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn fit_uses_smaller_axis_ratio() {
        let scale = fit_scale(Size::new(800.0, 600.0), PageSize::US_LETTER);
        assert!((scale - 600.0 / 792.0).abs() < 1e-6);
    }

    #[test]
    fn viewport_center_maps_to_page_center_at_reset() {
        let frame = letter_frame();
        let doc = screen_to_document(Point::new(400.0, 300.0), &ZoomState::RESET, &frame);

        assert_close(doc, Point::new(306.0, 396.0), EPSILON);
    }

    #[test]
    fn vertical_axis_is_flipped() {
        let frame = letter_frame();
        let zoom = ZoomState::RESET;

        let upper = screen_to_document(Point::new(400.0, 10.0), &zoom, &frame);
        let lower = screen_to_document(Point::new(400.0, 590.0), &zoom, &frame);

        assert!(upper.y > lower.y);
    }

    #[test]
    fn fitted_page_touches_viewport_edges_vertically() {
        let frame = letter_frame();
        let rect = frame.page_rect(&ZoomState::RESET);

        assert!(rect.y.abs() < EPSILON);
        assert!((rect.height - 600.0).abs() < EPSILON);
        assert!((rect.center().x - 400.0).abs() < EPSILON);
    }

    #[test]
    fn rect_conversion_keeps_bottom_left_origin() {
        let frame = letter_frame();
        let zoom = ZoomState::new(2.0, 30.0, -12.0);
        let screen = Rect::new(100.0, 100.0, 200.0, 150.0);

        let native = screen_rect_to_document(screen, &zoom, &frame);
        let bottom_left = screen_to_document(Point::new(100.0, 250.0), &zoom, &frame);
        assert_close(native.origin(), bottom_left, EPSILON);

        let back = document_rect_to_screen(native, &zoom, &frame);
        assert_close(back.origin(), screen.origin(), EPSILON);
        assert!((back.width - screen.width).abs() < EPSILON);
        assert!((back.height - screen.height).abs() < EPSILON);
    }

    proptest! {
        #[test]
        fn screen_document_round_trip(
            x in 0.0f32..800.0,
            y in 0.0f32..600.0,
            scale in 0.25f32..12.0,
            offset_x in -2000.0f32..2000.0,
            offset_y in -2000.0f32..2000.0,
        ) {
            let frame = letter_frame();
            let zoom = ZoomState::new(scale, offset_x, offset_y);
            let point = Point::new(x, y);

            let back = document_to_screen(screen_to_document(point, &zoom, &frame), &zoom, &frame);

            prop_assert!((back.x - point.x).abs() < 1e-2);
            prop_assert!((back.y - point.y).abs() < 1e-2);
        }
    }
}
