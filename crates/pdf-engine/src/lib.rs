use doc_model::{ContentRef, PageSize};
use image::{ImageBuffer, Rgba};
use lopdf::Document;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type Surface = ImageBuffer<Rgba<u8>, Vec<u8>>;

const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedDocument {
    pub handle: DocumentHandle,
    pub page_count: u32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<&ContentRef> for OpenSource {
    fn from(value: &ContentRef) -> Self {
        Self::Path(value.to_path())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    Empty,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Page rasterization collaborator. Implementations run on the render
/// worker thread, so they only need to be `Send`.
pub trait PageRasterizer: Send {
    fn open(&mut self, source: OpenSource) -> Result<OpenedDocument, RasterError>;

    /// Native size of the page at `page_index` (0-based).
    fn page_size(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageSize, RasterError>;

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<Surface, RasterError>;

    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        max_edge_px: u32,
    ) -> Result<Surface, RasterError> {
        let size = self.page_size(handle, page_index)?;
        let longest = size.width_pt.max(size.height_pt).max(1.0);
        let scale = max_edge_px.max(1) as f32 / longest;

        self.render_page(handle, page_index, scale)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), RasterError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

/// Measures pages with lopdf and produces blank page surfaces of the
/// right dimensions. Glyph rendering belongs to a real raster backend.
#[derive(Debug, Default)]
pub struct LopdfRasterizer {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, RasterError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(RasterError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let mut sizes = Vec::new();

        for (_, object_id) in doc.get_pages() {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| media_box_size(array))
                .unwrap_or(PageSize::US_LETTER);

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(RasterError::Empty);
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, RasterError> {
        self.docs.get(&handle).ok_or(RasterError::InvalidHandle(handle.raw()))
    }
}

fn media_box_size(array: &[lopdf::Object]) -> Option<PageSize> {
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    Some(PageSize::new((x1 - x0).abs(), (y1 - y0).abs()))
}

impl PageRasterizer for LopdfRasterizer {
    fn open(&mut self, source: OpenSource) -> Result<OpenedDocument, RasterError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;
        let page_count = page_sizes.len() as u32;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { page_sizes });
        log::debug!("opened document {} with {page_count} pages", handle.raw());

        Ok(OpenedDocument { handle, page_count })
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, RasterError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(RasterError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<Surface, RasterError> {
        let page_size = self.page_size(handle, page_index)?;
        let scale = if scale <= 0.0 { 1.0 } else { scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut surface = Surface::from_pixel(width, height, PAGE_BACKGROUND);

        if width >= 4 && height >= 4 {
            for x in 0..width {
                surface.put_pixel(x, 0, PAGE_BORDER);
                surface.put_pixel(x, height - 1, PAGE_BORDER);
            }
            for y in 0..height {
                surface.put_pixel(0, y, PAGE_BORDER);
                surface.put_pixel(width - 1, y, PAGE_BORDER);
            }
        }

        Ok(surface)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), RasterError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(RasterError::InvalidHandle(handle.raw()))
    }
}

pub fn default_rasterizer() -> LopdfRasterizer {
    LopdfRasterizer::new()
}
