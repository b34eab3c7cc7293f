//! Headless viewer sessions driven by a JSON action list.

use anyhow::{Context, Result};
use doc_model::{
    ContentRef, Highlight, Point, Signature, Size, Stamp, StampId, ViewerSnapshot, ZoomState,
};
use pdf_engine::default_rasterizer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use storage::Storage;
use viewer_core::{
    CancelOutcome, DocumentViewer, InteractionMode, LoadState, MarkupOutcome, PageStatus,
    PointerOutcome, StepBack,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayAction {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
    Mode {
        mode: ModeName,
        /// Stamp id or label, for `place_stamp`.
        #[serde(default)]
        stamp: Option<String>,
    },
    Cancel,
    StepBack,
    ResetZoom,
    GoToPage { page: u32 },
    NextPage,
    PreviousPage,
    Resize { width: f32, height: f32 },
    ClearMarkups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeName {
    Browse,
    ZoomSelect,
    Highlight,
    PlaceStamp,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// One entry per action describing what it did.
    pub steps: Vec<String>,
    pub page: u32,
    pub page_count: u32,
    pub page_status: &'static str,
    pub mode: &'static str,
    pub zoom: ZoomState,
    pub history_depth: usize,
    pub highlights: Vec<Highlight>,
    pub signatures: Vec<Signature>,
    pub pending_markups: usize,
    pub snapshot: Option<ViewerSnapshot>,
}

pub fn replay(
    file: &Path,
    actions: &[ReplayAction],
    viewport: Size,
    storage: &Storage,
) -> Result<ReplayReport> {
    let settings = storage.load_settings().context("failed to load settings")?;
    let mut viewer = DocumentViewer::new(Box::new(default_rasterizer()), viewport, settings)
        .context("failed to start viewer")?;

    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    viewer.open_document(ContentRef::from_path(file), file_name)?;
    settle(&mut viewer)?;

    if let LoadState::Failed { reason } = viewer.load_state() {
        anyhow::bail!("failed to open PDF: {reason}");
    }

    let mut steps = Vec::with_capacity(actions.len());
    for (index, action) in actions.iter().enumerate() {
        let step = apply(&mut viewer, action, storage)
            .with_context(|| format!("replay step {} failed", index + 1))?;
        settle(&mut viewer)?;

        log::debug!("step {}: {action:?} -> {step}", index + 1);
        steps.push(step);
    }

    Ok(report(&viewer, steps))
}

fn settle(viewer: &mut DocumentViewer) -> Result<()> {
    if !viewer.wait_idle(SETTLE_TIMEOUT) {
        anyhow::bail!("timed out waiting for rendering");
    }
    Ok(())
}

fn apply(viewer: &mut DocumentViewer, action: &ReplayAction, storage: &Storage) -> Result<String> {
    let step = match action {
        ReplayAction::Down { x, y } => pointer(viewer.pointer_down(Point::new(*x, *y))),
        ReplayAction::Move { x, y } => pointer(viewer.pointer_move(Point::new(*x, *y))),
        ReplayAction::Up { x, y } => pointer(viewer.pointer_up(Point::new(*x, *y))),
        ReplayAction::Mode { mode, stamp } => {
            let mode = match mode {
                ModeName::Browse => InteractionMode::Browse,
                ModeName::ZoomSelect => InteractionMode::ZoomSelect,
                ModeName::Highlight => InteractionMode::Highlight,
                ModeName::PlaceStamp => {
                    let key = stamp.as_deref().context("place_stamp needs a stamp id or label")?;
                    InteractionMode::PlaceStamp(find_stamp(storage, key)?)
                }
            };
            let name = mode_name(&mode);
            viewer.set_mode(mode);
            format!("mode {name}")
        }
        ReplayAction::Cancel => cancelled(viewer.cancel()).to_owned(),
        ReplayAction::StepBack => stepped(viewer.step_back()).to_owned(),
        ReplayAction::ResetZoom => {
            viewer.reset_zoom();
            "zoom reset".to_owned()
        }
        ReplayAction::GoToPage { page } => navigated(viewer.go_to_page(*page), viewer.page()),
        ReplayAction::NextPage => navigated(viewer.next_page(), viewer.page()),
        ReplayAction::PreviousPage => navigated(viewer.previous_page(), viewer.page()),
        ReplayAction::Resize { width, height } => {
            viewer.resize(Size::new(*width, *height));
            format!("viewport {width}x{height}")
        }
        ReplayAction::ClearMarkups => {
            viewer.clear_markups();
            "markups cleared".to_owned()
        }
    };

    Ok(step)
}

fn find_stamp(storage: &Storage, key: &str) -> Result<Stamp> {
    let library = storage.load_stamps().context("failed to load stamps")?;
    let by_id = StampId::parse(key).and_then(|id| library.get(id));

    by_id
        .or_else(|| library.iter().find(|stamp| stamp.label == key))
        .cloned()
        .with_context(|| format!("no saved stamp matches {key}"))
}

fn pointer(outcome: PointerOutcome) -> String {
    match outcome {
        PointerOutcome::Ignored => "ignored".to_owned(),
        PointerOutcome::Tracking => "tracking".to_owned(),
        PointerOutcome::Zoomed => "zoomed".to_owned(),
        PointerOutcome::Discarded => "discarded".to_owned(),
        PointerOutcome::Markup(MarkupOutcome::Added(id)) => format!("added {id}"),
        PointerOutcome::Markup(MarkupOutcome::Deferred) => "deferred".to_owned(),
        PointerOutcome::Markup(MarkupOutcome::Rejected) => "rejected".to_owned(),
    }
}

fn cancelled(outcome: CancelOutcome) -> &'static str {
    match outcome {
        CancelOutcome::SelectionAborted => "selection aborted",
        CancelOutcome::ZoomSteppedBack => "zoom stepped back",
        CancelOutcome::ZoomReset => "zoom reset",
        CancelOutcome::ModeExited => "mode exited",
        CancelOutcome::Ignored => "ignored",
    }
}

fn stepped(outcome: StepBack) -> &'static str {
    match outcome {
        StepBack::Restored => "zoom stepped back",
        StepBack::Reset => "zoom reset",
        StepBack::Unchanged => "unchanged",
    }
}

fn navigated(changed: bool, page: u32) -> String {
    if changed {
        format!("page {page}")
    } else {
        "unchanged".to_owned()
    }
}

fn mode_name(mode: &InteractionMode) -> &'static str {
    match mode {
        InteractionMode::Browse => "browse",
        InteractionMode::ZoomSelect => "zoom_select",
        InteractionMode::Highlight => "highlight",
        InteractionMode::PlaceStamp(_) => "place_stamp",
    }
}

fn report(viewer: &DocumentViewer, steps: Vec<String>) -> ReplayReport {
    let markups = viewer.markups();
    let pages = 1..=viewer.page_count();

    ReplayReport {
        steps,
        page: viewer.page(),
        page_count: viewer.page_count(),
        page_status: match viewer.page_status() {
            None => "none",
            Some(PageStatus::Loading) => "loading",
            Some(PageStatus::Ready { .. }) => "ready",
            Some(PageStatus::Failed { .. }) => "failed",
        },
        mode: mode_name(viewer.mode()),
        zoom: viewer.zoom().current(),
        history_depth: viewer.zoom().history_depth(),
        highlights: pages.clone().flat_map(|page| markups.highlights_on(page).to_vec()).collect(),
        signatures: pages.flat_map(|page| markups.signatures_on(page).to_vec()).collect(),
        pending_markups: markups.pending_count(),
        snapshot: viewer.snapshot(),
    }
}
