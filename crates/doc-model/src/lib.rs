use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle. `x`/`y` is the corner with the smallest
/// coordinates in whatever space the rectangle lives in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalised rectangle spanning two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);

        Self { x: min_x, y: min_y, width: (a.x - b.x).abs(), height: (a.y - b.y).abs() }
    }

    pub fn centered_at(center: Point, size: Size) -> Self {
        Self {
            x: center.x - size.width / 2.0,
            y: center.y - size.height / 2.0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn far_corner(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// True when both sides are strictly larger than `min_side`.
    pub fn exceeds(&self, min_side: f32) -> bool {
        self.width > min_side && self.height > min_side
    }
}

/// Native page dimensions in points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const US_LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    pub const fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::US_LETTER
    }
}

/// Scale and pan applied to the rendered page, anchored at the page's
/// visual center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl ZoomState {
    pub const RESET: ZoomState = ZoomState { scale: 1.0, offset_x: 0.0, offset_y: 0.0 };

    pub fn new(scale: f32, offset_x: f32, offset_y: f32) -> Self {
        Self { scale, offset_x, offset_y }
    }

    pub fn is_reset(&self) -> bool {
        *self == Self::RESET
    }

    pub fn can_pan(&self) -> bool {
        self.scale > 1.0
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::RESET
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const YELLOW: Rgb = Rgb { r: 255, g: 235, b: 59 };
    pub const GREEN: Rgb = Rgb { r: 118, g: 255, b: 3 };
    pub const PINK: Rgb = Rgb { r: 255, g: 64, b: 129 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::YELLOW
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkupId(Uuid);

impl MarkupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MarkupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarkupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampId(Uuid);

impl StampId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for StampId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a stamp bitmap (data URL, file path, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

/// Reference to document content the viewer can open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(pub String);

impl ContentRef {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().display().to_string())
    }

    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

/// Highlight over a text region. Bounds are page-native with a
/// bottom-left origin and never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: MarkupId,
    pub page: u32,
    pub bounds: Rect,
    pub color: Rgb,
    pub text: Option<String>,
}

/// Placed stamp. Only `bounds.x`/`bounds.y` move after placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub id: MarkupId,
    pub image: ImageRef,
    pub page: u32,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: StampId,
    pub label: String,
    pub image: ImageRef,
}

impl Stamp {
    pub fn new(label: impl Into<String>, image: ImageRef) -> Self {
        Self { id: StampId::new(), label: label.into(), image }
    }
}

/// Saved stamps in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StampLibrary {
    stamps: Vec<Stamp>,
}

impl StampLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: StampId) -> Option<&Stamp> {
        self.stamps.iter().find(|stamp| stamp.id == id)
    }

    pub fn push(&mut self, stamp: Stamp) {
        self.stamps.retain(|existing| existing.id != stamp.id);
        self.stamps.push(stamp);
    }

    pub fn remove(&mut self, id: StampId) -> Option<Stamp> {
        let index = self.stamps.iter().position(|stamp| stamp.id == id)?;
        Some(self.stamps.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stamp> {
        self.stamps.iter()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// State mirrored from the primary viewer into a secondary window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSnapshot {
    pub content_ref: ContentRef,
    pub page: u32,
    pub page_count: u32,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Both sides of a drag must exceed this (screen units) to count.
    pub min_selection_size: f32,
    /// Initial stamp size in page units.
    pub signature_size: Size,
    pub highlight_color: Rgb,
    pub device_pixel_ratio: f32,
    pub thumbnail_edge_px: u32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("min_selection_size must be a finite number >= 0, got {0}")]
    MinSelectionSize(f32),
    #[error("signature_size must be positive, got {width}x{height}")]
    SignatureSize { width: f32, height: f32 },
    #[error("device_pixel_ratio must be a finite number > 0, got {0}")]
    DevicePixelRatio(f32),
    #[error("thumbnail_edge_px must be at least 1")]
    ThumbnailEdge,
}

impl ViewerSettings {
    /// Rejects values the viewer cannot work with, such as a negative
    /// selection threshold or a zero stamp size.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = |value: f32| value.is_finite() && value > 0.0;

        if !(self.min_selection_size.is_finite() && self.min_selection_size >= 0.0) {
            return Err(SettingsError::MinSelectionSize(self.min_selection_size));
        }
        let Size { width, height } = self.signature_size;
        if !(positive(width) && positive(height)) {
            return Err(SettingsError::SignatureSize { width, height });
        }
        if !positive(self.device_pixel_ratio) {
            return Err(SettingsError::DevicePixelRatio(self.device_pixel_ratio));
        }
        if self.thumbnail_edge_px == 0 {
            return Err(SettingsError::ThumbnailEdge);
        }

        Ok(())
    }
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            min_selection_size: 10.0,
            signature_size: Size::new(150.0, 50.0),
            highlight_color: Rgb::YELLOW,
            device_pixel_ratio: 1.0,
            thumbnail_edge_px: 160,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert_eq!(ViewerSettings::default().validate(), Ok(()));
    }

    #[test]
    fn unusable_settings_are_rejected() {
        let negative = ViewerSettings { min_selection_size: -1.0, ..ViewerSettings::default() };
        assert_eq!(negative.validate(), Err(SettingsError::MinSelectionSize(-1.0)));

        let flat =
            ViewerSettings { signature_size: Size::new(150.0, 0.0), ..ViewerSettings::default() };
        assert!(matches!(flat.validate(), Err(SettingsError::SignatureSize { .. })));

        let dpr = ViewerSettings { device_pixel_ratio: 0.0, ..ViewerSettings::default() };
        assert_eq!(dpr.validate(), Err(SettingsError::DevicePixelRatio(0.0)));

        let nan = ViewerSettings { device_pixel_ratio: f32::NAN, ..ViewerSettings::default() };
        assert!(nan.validate().is_err());

        let thumbs = ViewerSettings { thumbnail_edge_px: 0, ..ViewerSettings::default() };
        assert_eq!(thumbs.validate(), Err(SettingsError::ThumbnailEdge));
    }

    #[test]
    fn rect_from_corners_normalizes_any_drag_direction() {
        let rect = Rect::from_corners(Point::new(300.0, 250.0), Point::new(100.0, 100.0));
        assert_eq!(rect, Rect::new(100.0, 100.0, 200.0, 150.0));
        assert_eq!(rect.center(), Point::new(200.0, 175.0));
    }

    #[test]
    fn exceeds_requires_both_sides_strictly_larger() {
        assert!(Rect::new(0.0, 0.0, 11.0, 11.0).exceeds(10.0));
        assert!(!Rect::new(0.0, 0.0, 10.0, 200.0).exceeds(10.0));
        assert!(!Rect::new(0.0, 0.0, 200.0, 4.0).exceeds(10.0));
    }

    #[test]
    fn zoom_reset_is_canonical_and_not_pannable() {
        let reset = ZoomState::default();
        assert!(reset.is_reset());
        assert!(!reset.can_pan());
        assert!(ZoomState::new(2.0, 0.0, 0.0).can_pan());
    }

    #[test]
    fn snapshot_uses_camel_case_wire_keys() {
        let snapshot = ViewerSnapshot {
            content_ref: ContentRef("/tmp/report.pdf".to_owned()),
            page: 2,
            page_count: 7,
            file_name: "report.pdf".to_owned(),
        };

        let value = serde_json::to_value(&snapshot).expect("snapshot should serialize");
        assert_eq!(value["contentRef"], "/tmp/report.pdf");
        assert_eq!(value["pageCount"], 7);
        assert_eq!(value["fileName"], "report.pdf");
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: ViewerSettings =
            serde_json::from_str(r#"{ "min_selection_size": 4.0 }"#).expect("should parse");

        assert_eq!(settings.min_selection_size, 4.0);
        assert_eq!(settings.signature_size, Size::new(150.0, 50.0));
        assert_eq!(settings.highlight_color, Rgb::YELLOW);
    }

    #[test]
    fn stamp_library_replaces_same_id_and_removes() {
        let mut library = StampLibrary::new();
        let stamp = Stamp::new("initials", ImageRef("data:image/png;base64,AAAA".to_owned()));
        let id = stamp.id;

        library.push(stamp.clone());
        library.push(Stamp { label: "renamed".to_owned(), ..stamp });
        assert_eq!(library.len(), 1);
        assert_eq!(library.get(id).map(|s| s.label.as_str()), Some("renamed"));

        assert!(library.remove(id).is_some());
        assert!(library.is_empty());
    }
}
