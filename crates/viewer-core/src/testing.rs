//! Scripted rasterizer for worker and viewer tests.

use doc_model::PageSize;
use pdf_engine::{
    DocumentHandle, OpenSource, OpenedDocument, PageRasterizer, RasterError, Surface,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Documents are keyed by file name; unknown names fail to open.
#[derive(Debug, Clone, Default)]
pub struct MockRasterizer {
    documents: HashMap<String, Vec<PageSize>>,
    failing_pages: HashSet<u32>,
    crashing_pages: HashSet<u32>,
    open_delay: Option<Duration>,
    next_handle: u64,
    opened: HashMap<DocumentHandle, Vec<PageSize>>,
}

impl MockRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, name: &str, pages: Vec<PageSize>) -> Self {
        self.documents.insert(name.to_owned(), pages);
        self
    }

    /// Makes every render of the 0-based `page_index` fail.
    pub fn failing_page(mut self, page_index: u32) -> Self {
        self.failing_pages.insert(page_index);
        self
    }

    /// Panics while rendering the 0-based `page_index`, taking the
    /// worker thread down with it.
    pub fn crashing_page(mut self, page_index: u32) -> Self {
        self.crashing_pages.insert(page_index);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    fn pages(&self, handle: DocumentHandle) -> Result<&Vec<PageSize>, RasterError> {
        self.opened.get(&handle).ok_or(RasterError::InvalidHandle(handle.raw()))
    }
}

impl PageRasterizer for MockRasterizer {
    fn open(&mut self, source: OpenSource) -> Result<OpenedDocument, RasterError> {
        if let Some(delay) = self.open_delay {
            thread::sleep(delay);
        }

        let name = match source {
            OpenSource::Path(path) => Path::new(&path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            OpenSource::Bytes(_) => String::new(),
        };

        let pages = self
            .documents
            .get(&name)
            .cloned()
            .ok_or_else(|| RasterError::Backend(format!("cannot open {name}")))?;

        self.next_handle += 1;
        let handle = DocumentHandle::from_raw(self.next_handle);
        let page_count = pages.len() as u32;
        self.opened.insert(handle, pages);

        Ok(OpenedDocument { handle, page_count })
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, RasterError> {
        let pages = self.pages(handle)?;
        pages.get(page_index as usize).copied().ok_or(RasterError::PageOutOfRange {
            page: page_index,
            page_count: pages.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<Surface, RasterError> {
        let size = self.page_size(handle, page_index)?;
        if self.crashing_pages.contains(&page_index) {
            panic!("rasterizer crashed on page {page_index}");
        }
        if self.failing_pages.contains(&page_index) {
            return Err(RasterError::Backend(format!("page {page_index} is corrupt")));
        }

        let width = (size.width_pt * scale).round().max(1.0) as u32;
        let height = (size.height_pt * scale).round().max(1.0) as u32;
        Ok(Surface::new(width, height))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), RasterError> {
        self.opened.remove(&handle);
        Ok(())
    }
}
