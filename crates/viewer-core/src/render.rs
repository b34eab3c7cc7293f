//! Background page rendering.
//!
//! A single worker thread owns the rasterizer. The viewer sends commands
//! over a channel and drains results from another; every open, page and
//! thumbnail command produces exactly one event. Events carry the
//! generation of the document they were issued for so results that
//! arrive after a newer open can be told apart and dropped.

use crate::error::{ViewerError, ViewerResult};
use crate::transform::fit_scale;
use doc_model::{PageSize, Size};
use pdf_engine::{DocumentHandle, OpenSource, PageRasterizer, RasterError, Surface};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Longest surface edge the worker will produce, in device pixels.
pub const MAX_SURFACE_EDGE: f32 = 4096.0;

/// Everything the worker needs to pick a render scale for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub viewport: Size,
    pub zoom_scale: f32,
    pub device_pixel_ratio: f32,
}

enum Command {
    Open { generation: u64, source: OpenSource },
    Page { generation: u64, request: PageRequest },
    Thumbnail { generation: u64, page: u32, max_edge_px: u32 },
    Close,
    Shutdown,
}

#[derive(Debug)]
pub enum RenderEvent {
    Opened { generation: u64, page_count: u32 },
    OpenFailed { generation: u64, reason: String },
    PageRendered { generation: u64, page: u32, page_size: PageSize, scale: f32, surface: Surface },
    PageFailed { generation: u64, page: u32, reason: String },
    ThumbnailRendered { generation: u64, page: u32, surface: Surface },
    ThumbnailFailed { generation: u64, page: u32, reason: String },
}

impl RenderEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation, .. }
            | Self::OpenFailed { generation, .. }
            | Self::PageRendered { generation, .. }
            | Self::PageFailed { generation, .. }
            | Self::ThumbnailRendered { generation, .. }
            | Self::ThumbnailFailed { generation, .. } => *generation,
        }
    }
}

pub struct RenderWorker {
    commands: Sender<Command>,
    events: Receiver<RenderEvent>,
    thread: Option<JoinHandle<()>>,
    generation: u64,
    in_flight: usize,
}

impl RenderWorker {
    pub fn spawn(rasterizer: Box<dyn PageRasterizer>) -> ViewerResult<Self> {
        let (commands, command_rx) = mpsc::channel();
        let (event_tx, events) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("dropshelf-render".to_owned())
            .spawn(move || run(rasterizer, command_rx, event_tx))
            .map_err(ViewerError::WorkerSpawn)?;

        Ok(Self { commands, events, thread: Some(thread), generation: 0, in_flight: 0 })
    }

    /// Generation of the most recent open or close.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Commands sent whose event has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Starts opening a document and returns its generation.
    pub fn open(&mut self, source: OpenSource) -> ViewerResult<u64> {
        self.generation += 1;
        let generation = self.generation;

        self.send(Command::Open { generation, source })?;
        self.in_flight += 1;
        Ok(generation)
    }

    pub fn request_page(&mut self, request: PageRequest) -> ViewerResult<()> {
        self.send(Command::Page { generation: self.generation, request })?;
        self.in_flight += 1;
        Ok(())
    }

    pub fn request_thumbnail(&mut self, page: u32, max_edge_px: u32) -> ViewerResult<()> {
        self.send(Command::Thumbnail { generation: self.generation, page, max_edge_px })?;
        self.in_flight += 1;
        Ok(())
    }

    /// Closes the current document. Results still queued for it become
    /// stale.
    pub fn close(&mut self) -> ViewerResult<()> {
        self.generation += 1;
        self.send(Command::Close)
    }

    pub fn try_next(&mut self) -> Option<RenderEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(self.received(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.in_flight = 0;
                None
            }
        }
    }

    pub fn next_timeout(&mut self, timeout: Duration) -> Option<RenderEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.received(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = 0;
                None
            }
        }
    }

    fn received(&mut self, event: RenderEvent) -> RenderEvent {
        self.in_flight = self.in_flight.saturating_sub(1);
        event
    }

    fn send(&self, command: Command) -> ViewerResult<()> {
        self.commands.send(command).map_err(|_| ViewerError::WorkerUnavailable)
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("render worker panicked");
            }
        }
    }
}

struct OpenDocument {
    generation: u64,
    handle: DocumentHandle,
}

fn run(
    mut rasterizer: Box<dyn PageRasterizer>,
    commands: Receiver<Command>,
    events: Sender<RenderEvent>,
) {
    let mut current: Option<OpenDocument> = None;

    while let Ok(command) = commands.recv() {
        let event = match command {
            Command::Open { generation, source } => {
                close_current(rasterizer.as_mut(), &mut current);

                match rasterizer.open(source) {
                    Ok(opened) => {
                        current = Some(OpenDocument { generation, handle: opened.handle });
                        RenderEvent::Opened { generation, page_count: opened.page_count }
                    }
                    Err(error) => RenderEvent::OpenFailed { generation, reason: error.to_string() },
                }
            }
            Command::Page { generation, request } => {
                match render_page(rasterizer.as_ref(), current.as_ref(), generation, request) {
                    Ok((page_size, scale, surface)) => RenderEvent::PageRendered {
                        generation,
                        page: request.page,
                        page_size,
                        scale,
                        surface,
                    },
                    Err(error) => RenderEvent::PageFailed {
                        generation,
                        page: request.page,
                        reason: error.to_string(),
                    },
                }
            }
            Command::Thumbnail { generation, page, max_edge_px } => {
                let rendered = handle_for(current.as_ref(), generation).and_then(|handle| {
                    rasterizer.render_thumbnail(handle, page_index(page)?, max_edge_px)
                });

                match rendered {
                    Ok(surface) => RenderEvent::ThumbnailRendered { generation, page, surface },
                    Err(error) => {
                        RenderEvent::ThumbnailFailed { generation, page, reason: error.to_string() }
                    }
                }
            }
            Command::Close => {
                close_current(rasterizer.as_mut(), &mut current);
                continue;
            }
            Command::Shutdown => break,
        };

        if events.send(event).is_err() {
            break;
        }
    }

    close_current(rasterizer.as_mut(), &mut current);
}

fn close_current(rasterizer: &mut dyn PageRasterizer, current: &mut Option<OpenDocument>) {
    if let Some(document) = current.take() {
        if let Err(error) = rasterizer.close(document.handle) {
            log::warn!("failed to close document: {error}");
        }
    }
}

fn handle_for(current: Option<&OpenDocument>, generation: u64) -> Result<DocumentHandle, RasterError> {
    match current {
        Some(document) if document.generation == generation => Ok(document.handle),
        _ => Err(RasterError::Backend("document is no longer open".to_owned())),
    }
}

fn page_index(page: u32) -> Result<u32, RasterError> {
    page.checked_sub(1).ok_or(RasterError::PageOutOfRange { page, page_count: 0 })
}

fn render_page(
    rasterizer: &dyn PageRasterizer,
    current: Option<&OpenDocument>,
    generation: u64,
    request: PageRequest,
) -> Result<(PageSize, f32, Surface), RasterError> {
    let handle = handle_for(current, generation)?;
    let index = page_index(request.page)?;
    let page_size = rasterizer.page_size(handle, index)?;

    let requested =
        fit_scale(request.viewport, page_size) * request.zoom_scale * request.device_pixel_ratio;
    let longest = page_size.width_pt.max(page_size.height_pt).max(1.0);
    let scale = requested.min(MAX_SURFACE_EDGE / longest);
    if scale < requested {
        log::debug!("capping render scale {requested:.2} to {scale:.2} for page {}", request.page);
    }

    let surface = rasterizer.render_page(handle, index, scale)?;
    Ok((page_size, scale, surface))
}
