//! The view-state container: owns the live [`ViewState`], the active document,
//! jump history, per-document progress and the recent-documents list.
//!
//! Every mutation goes through a method here. After a batch of mutations the
//! caller-facing entry points run [`ViewStateStore::sync_scroll`], which is where
//! externally requested page changes turn into scroll offsets.

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::command::{Action, CommandInterpreter, KeyContext, PendingCommand};
use crate::config::ViewerConfig;
use crate::document::{
    DecodeOutcome, DocumentBackend, DocumentId, DocumentRef, DocumentSource, PageSize,
};
use crate::error::ViewerError;
use crate::finder::{FinderOutcome, RecentFinder};
use crate::history::{JumpEntry, JumpHistory};
use crate::input::KeyInput;
use crate::outline::{
    flatten, index_of, step_selection, FlatOutlineItem, OutlineNode, OutlineWindow,
};
use crate::persistence::{BlobStore, KeyValueStore};
use crate::progress::{load_progress, save_progress, DocumentProgress};
use crate::recent::{RecentDocument, RecentDocuments};
use crate::scale::{FitMode, Zoom, ZoomLimits};
use crate::scroll::{page_height, rescale_offset, Align, ScrollGeometry};
use crate::view::{FocusMode, Theme, ViewState, Viewport};

const THEME_KEY: &str = "theme";

#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The front-end should decode `reference` and hand the outcome back through
    /// [`ViewStateStore::apply_decoded`].
    DecodeRequested {
        reference: DocumentRef,
        generation: u64,
    },
    RedrawNeeded,
    FullscreenToggled(bool),
    Quit,
}

struct ActiveDocument {
    reference: DocumentRef,
    id: DocumentId,
    generation: u64,
    backend: Option<Arc<dyn DocumentBackend>>,
    base_page_size: PageSize,
    outline: Vec<OutlineNode>,
    flat_outline: Vec<FlatOutlineItem>,
    decoded: bool,
    restored: bool,
}

/// Deferred scroll adjustment, resolved once layout geometry is known.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum ScrollSync {
    #[default]
    Idle,
    SnapToPage(Align),
    /// Snap to the top of the current page, then record it as a jump target.
    LandJump,
    RestoreOffset(f32),
}

#[derive(Debug, Clone, Copy)]
struct PendingSave {
    due: Instant,
    generation: u64,
    page: usize,
    scroll_offset: f32,
}

pub struct ViewStateStore {
    config: ViewerConfig,
    limits: ZoomLimits,
    kv: Arc<dyn KeyValueStore>,
    blobs: Arc<dyn BlobStore>,
    view: ViewState,
    viewport: Viewport,
    history: JumpHistory,
    interpreter: CommandInterpreter,
    document: Option<ActiveDocument>,
    recent: RecentDocuments,
    finder: RecentFinder,
    outline_window: OutlineWindow,
    generation: u64,
    initial_page: Option<usize>,
    internal_page_update: bool,
    scroll_sync: ScrollSync,
    pending_save: Option<PendingSave>,
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl ViewStateStore {
    pub fn new(
        config: ViewerConfig,
        kv: Arc<dyn KeyValueStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let view = ViewState::new(config.render_scale, config.fit_ratio);
        Self {
            limits: config.zoom_limits(),
            history: JumpHistory::new(config.history_capacity, config.history_tolerance),
            recent: RecentDocuments::new(config.recent_capacity),
            config,
            kv,
            blobs,
            view,
            viewport: Viewport::default(),
            interpreter: CommandInterpreter::new(),
            document: None,
            finder: RecentFinder::new(),
            outline_window: OutlineWindow::default(),
            generation: 0,
            initial_page: None,
            internal_page_update: false,
            scroll_sync: ScrollSync::Idle,
            pending_save: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn drain_events(&self) -> Vec<StoreEvent> {
        mem::take(&mut *self.events.lock())
    }

    fn emit(&self, event: StoreEvent) {
        self.events.lock().push(event);
    }

    fn redraw(&self) {
        self.emit(StoreEvent::RedrawNeeded);
    }

    /// Loads the sticky preferences and the recent-documents list. Missing or
    /// unreadable records leave the defaults in place.
    pub fn hydrate(&mut self) {
        match self.kv.get(THEME_KEY) {
            Ok(Some(Value::String(theme))) => match theme.parse::<Theme>() {
                Ok(theme) => self.view.theme = theme,
                Err(err) => warn!(?err, "ignoring stored theme"),
            },
            Ok(_) => {}
            Err(err) => warn!(?err, "failed to load theme"),
        }
        match RecentDocuments::load(self.kv.as_ref(), self.config.recent_capacity) {
            Ok(recent) => self.recent = recent,
            Err(err) => warn!(?err, "failed to load recent documents"),
        }
    }

    // ---- read access -------------------------------------------------------

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn current_page(&self) -> usize {
        self.view.current_page
    }

    pub fn num_pages(&self) -> Option<usize> {
        self.view.num_pages
    }

    pub fn render_scale(&self) -> f32 {
        self.view.render_scale
    }

    pub fn zoom(&self) -> Zoom {
        self.view.zoom
    }

    pub fn visual_scale(&self) -> f32 {
        self.view.zoom.visual_scale
    }

    pub fn fit_mode(&self) -> FitMode {
        self.view.zoom.fit_mode
    }

    pub fn fit_ratio(&self) -> f32 {
        self.view.zoom.fit_ratio
    }

    pub fn sidebar_open(&self) -> bool {
        self.view.sidebar_open
    }

    pub fn focus_mode(&self) -> FocusMode {
        self.view.focus_mode
    }

    pub fn selected_outline_path(&self) -> Option<&str> {
        self.view.selected_outline_path.as_deref()
    }

    pub fn expanded_outline_paths(&self) -> &HashSet<String> {
        &self.view.expanded_outline_paths
    }

    pub fn theme(&self) -> Theme {
        self.view.theme
    }

    pub fn fullscreen(&self) -> bool {
        self.view.fullscreen
    }

    pub fn help_open(&self) -> bool {
        self.view.help_open
    }

    pub fn finder_open(&self) -> bool {
        self.view.finder_open
    }

    pub fn scroll_offset(&self) -> f32 {
        self.view.scroll_offset
    }

    pub fn pending_command(&self) -> Option<PendingCommand> {
        self.interpreter.pending()
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    pub fn history(&self) -> &JumpHistory {
        &self.history
    }

    pub fn recent(&self) -> &RecentDocuments {
        &self.recent
    }

    pub fn finder(&self) -> &RecentFinder {
        &self.finder
    }

    pub fn zoom_limits(&self) -> &ZoomLimits {
        &self.limits
    }

    pub fn active_identity(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.reference.identity.as_str())
    }

    pub fn backend(&self) -> Option<Arc<dyn DocumentBackend>> {
        self.document.as_ref().and_then(|doc| doc.backend.clone())
    }

    pub fn is_decoded(&self) -> bool {
        self.document.as_ref().map(|doc| doc.decoded).unwrap_or(false)
    }

    pub fn base_page_size(&self) -> PageSize {
        self.document
            .as_ref()
            .map(|doc| doc.base_page_size)
            .unwrap_or(PageSize::FALLBACK)
    }

    pub fn outline(&self) -> &[FlatOutlineItem] {
        self.document
            .as_ref()
            .map(|doc| doc.flat_outline.as_slice())
            .unwrap_or(&[])
    }

    pub fn outline_window(&self) -> OutlineWindow {
        self.outline_window
    }

    pub fn available_width(&self) -> f32 {
        self.viewport
            .available_width(self.view.sidebar_open, self.view.fullscreen)
    }

    pub fn displayed_scale(&self) -> f32 {
        self.view
            .displayed_scale(&self.viewport, self.base_page_size().width)
    }

    pub fn transform_ratio(&self) -> f32 {
        self.view
            .transform_ratio(&self.viewport, self.base_page_size().width)
    }

    /// Layout in raster pixels. `None` until the active document is decoded.
    pub fn geometry(&self) -> Option<ScrollGeometry> {
        let doc = self.document.as_ref()?;
        if !doc.decoded {
            return None;
        }
        Some(ScrollGeometry {
            page_height: page_height(
                doc.base_page_size.height,
                self.view.render_scale,
                self.config.page_gap,
            ),
            viewport_height: self.viewport.height / self.transform_ratio(),
            num_pages: self.view.last_page(),
        })
    }

    pub fn key_context(&self) -> KeyContext {
        KeyContext {
            focus: self.view.focus_mode,
            help_open: self.view.help_open,
        }
    }

    /// True while keystrokes are text for the command line or the finder.
    pub fn text_entry_active(&self) -> bool {
        self.view.finder_open || self.interpreter.is_command_line()
    }

    /// Held scroll/zoom keys only act in document focus with no sequence in
    /// progress.
    pub fn repeat_keys_enabled(&self) -> bool {
        self.view.focus_mode == FocusMode::Document
            && self.interpreter.is_normal()
            && !self.view.finder_open
    }

    // ---- setters -----------------------------------------------------------

    /// Sets the page. A change that did not come from scrolling snaps the scroll
    /// position to the top of the new page.
    pub fn set_current_page(&mut self, page: usize) {
        let internal = mem::take(&mut self.internal_page_update);
        let page = self.view.clamp_page(page);
        if page == self.view.current_page {
            return;
        }
        debug!(from = self.view.current_page, to = page, internal, "page changed");
        self.view.current_page = page;
        if !internal {
            self.scroll_sync = ScrollSync::SnapToPage(Align::Start);
        }
        self.schedule_save();
        self.redraw();
    }

    /// Scrolls to `offset` (raster pixels) and derives the page from it.
    pub fn scroll_to(&mut self, offset: f32) {
        if !offset.is_finite() {
            warn!(offset, "rejecting non-finite scroll offset");
            return;
        }
        let offset = match self.geometry() {
            Some(geometry) => geometry.clamp(offset),
            None => offset.max(0.0),
        };
        if offset == self.view.scroll_offset {
            return;
        }
        self.view.scroll_offset = offset;
        self.scroll_sync = ScrollSync::Idle;
        self.sync_page_from_scroll();
        self.schedule_save();
        self.redraw();
    }

    fn sync_page_from_scroll(&mut self) {
        if let Some(geometry) = self.geometry() {
            let page = geometry.page_at(self.view.scroll_offset);
            if page != self.view.current_page {
                self.internal_page_update = true;
                self.set_current_page(page);
            }
        }
    }

    pub fn set_render_scale(&mut self, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            warn!(scale, "rejecting invalid render scale");
            return;
        }
        self.preserving_centre(|store| store.view.render_scale = scale);
    }

    pub fn set_visual_scale(&mut self, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            warn!(scale, "rejecting invalid visual scale");
            return;
        }
        self.preserving_centre(|store| store.view.zoom.visual_scale = scale);
    }

    pub fn set_fit_ratio(&mut self, ratio: f32) {
        if !(ratio.is_finite() && ratio > 0.0) {
            warn!(ratio, "rejecting invalid fit ratio");
            return;
        }
        self.preserving_centre(|store| store.view.zoom.fit_ratio = ratio);
    }

    /// Switches mode without changing the displayed magnification.
    pub fn set_fit_mode(&mut self, mode: FitMode) {
        if mode == self.view.zoom.fit_mode {
            return;
        }
        let available = self.available_width();
        let base = self.base_page_size().width;
        match mode {
            FitMode::Absolute => self.view.zoom.set_absolute(None, available, base),
            FitMode::Relative => self.view.zoom.set_relative(None, available, base),
        }
        self.schedule_save();
        self.redraw();
    }

    /// Replaces the whole zoom state, rejecting non-finite values.
    pub fn set_zoom(&mut self, zoom: Zoom) {
        let valid = |value: f32| value.is_finite() && value > 0.0;
        if !valid(zoom.visual_scale) || !valid(zoom.fit_ratio) {
            warn!(?zoom, "rejecting invalid zoom");
            return;
        }
        if zoom == self.view.zoom {
            return;
        }
        self.preserving_centre(|store| store.view.zoom = zoom);
    }

    pub fn set_sidebar_open(&mut self, open: bool) {
        if open == self.view.sidebar_open {
            return;
        }
        self.preserving_centre(|store| store.view.sidebar_open = open);
    }

    pub fn set_focus_mode(&mut self, focus: FocusMode) {
        if focus == self.view.focus_mode {
            return;
        }
        self.view.focus_mode = focus;
        if focus == FocusMode::Outline && self.view.selected_outline_path.is_none() {
            self.view.selected_outline_path = self.outline().first().map(|item| item.path.clone());
            self.follow_outline_selection();
        }
        self.redraw();
    }

    pub fn select_outline_path(&mut self, path: Option<String>) {
        let path = path.filter(|path| index_of(self.outline(), path).is_some());
        if path == self.view.selected_outline_path {
            return;
        }
        self.view.selected_outline_path = path;
        self.follow_outline_selection();
        self.redraw();
    }

    pub fn set_outline_expanded(&mut self, path: &str, expanded: bool) {
        let changed = if expanded {
            self.view.expanded_outline_paths.insert(path.to_string())
        } else {
            self.view.expanded_outline_paths.remove(path)
        };
        if changed {
            self.reflatten_outline();
            self.redraw();
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if theme == self.view.theme {
            return;
        }
        self.view.theme = theme;
        if let Err(err) = self.kv.set(THEME_KEY, Value::String(theme.as_str().to_string())) {
            warn!(?err, "failed to persist theme");
        }
        self.redraw();
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if fullscreen == self.view.fullscreen {
            return;
        }
        self.preserving_centre(|store| store.view.fullscreen = fullscreen);
        self.emit(StoreEvent::FullscreenToggled(fullscreen));
    }

    pub fn set_help_open(&mut self, open: bool) {
        if open != self.view.help_open {
            self.view.help_open = open;
            self.redraw();
        }
    }

    pub fn set_finder_open(&mut self, open: bool) {
        if open != self.view.finder_open {
            self.view.finder_open = open;
            self.finder.reset();
            self.redraw();
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.preserving_centre(|store| store.viewport = viewport);
        self.follow_outline_selection();
        self.sync_scroll();
    }

    /// Page to show once the next decode finishes, instead of the restored one.
    pub fn set_initial_page(&mut self, page: usize) {
        self.initial_page = Some(page.max(1));
    }

    /// Runs `change` and then moves the scroll offset so the content at the
    /// centre of the viewport stays there.
    fn preserving_centre(&mut self, change: impl FnOnce(&mut Self)) {
        let before = self.geometry();
        change(self);
        if let (Some(before), Some(after)) = (before, self.geometry()) {
            let centre = self.view.scroll_offset + before.viewport_height / 2.0;
            let centre = rescale_offset(centre, before.page_height, after.page_height);
            self.view.scroll_offset = after.clamp(centre - after.viewport_height / 2.0);
            if let ScrollSync::RestoreOffset(_) = self.scroll_sync {
                self.scroll_sync = ScrollSync::Idle;
            }
            self.sync_page_from_scroll();
        }
        self.schedule_save();
        self.redraw();
    }

    // ---- effects -----------------------------------------------------------

    /// Resolves a deferred scroll adjustment once geometry is available.
    pub fn sync_scroll(&mut self) {
        let Some(geometry) = self.geometry() else {
            return;
        };
        match mem::take(&mut self.scroll_sync) {
            ScrollSync::Idle => {}
            ScrollSync::SnapToPage(align) => {
                self.view.scroll_offset = geometry.offset_for(self.view.current_page, align);
                self.redraw();
            }
            ScrollSync::LandJump => {
                self.view.scroll_offset = geometry.offset_for(self.view.current_page, Align::Start);
                self.history.push(self.current_entry());
                self.redraw();
            }
            ScrollSync::RestoreOffset(offset) => {
                self.view.scroll_offset = geometry.clamp(offset);
                self.redraw();
            }
        }
    }

    // ---- documents ---------------------------------------------------------

    /// Makes `reference` the active document. The outgoing document's live state
    /// is written to its progress record first; decoding happens asynchronously
    /// through [`StoreEvent::DecodeRequested`].
    #[instrument(skip(self, reference), fields(identity = %reference.identity))]
    pub fn open_document(&mut self, reference: DocumentRef) {
        let same_identity = self.active_identity() == Some(reference.identity.as_str());
        self.snapshot_active();
        self.pending_save = None;
        self.generation += 1;
        self.interpreter.reset();
        self.set_finder_open(false);

        let id = reference.id();
        let mut restored = same_identity;
        if !same_identity {
            self.reset_for_new_document();
            match load_progress(self.kv.as_ref(), &id) {
                Ok(Some(progress)) => {
                    progress.apply(&mut self.view, &mut self.history);
                    restored = true;
                    info!(page = progress.page, "restored reading progress");
                }
                Ok(None) => {}
                Err(err) => warn!(?err, "failed to load reading progress"),
            }
        }

        self.view.num_pages = None;
        self.scroll_sync = ScrollSync::RestoreOffset(self.view.scroll_offset);
        self.document = Some(ActiveDocument {
            reference: reference.clone(),
            id,
            generation: self.generation,
            backend: None,
            base_page_size: PageSize::FALLBACK,
            outline: Vec::new(),
            flat_outline: Vec::new(),
            decoded: false,
            restored,
        });
        self.record_recent(&reference);
        self.emit(StoreEvent::DecodeRequested {
            reference,
            generation: self.generation,
        });
        self.redraw();
    }

    fn reset_for_new_document(&mut self) {
        let theme = self.view.theme;
        let fullscreen = self.view.fullscreen;
        let help_open = self.view.help_open;
        self.view = ViewState::new(self.config.render_scale, self.config.fit_ratio);
        self.view.theme = theme;
        self.view.fullscreen = fullscreen;
        self.view.help_open = help_open;
        self.history.clear();
        self.outline_window = OutlineWindow::default();
    }

    /// Applies an asynchronous decode result if it still belongs to the active
    /// document; anything older is dropped.
    pub fn apply_decoded(&mut self, outcome: DecodeOutcome) {
        let Some(doc) = self.document.as_mut() else {
            debug!(identity = %outcome.identity, "decode finished with no active document");
            return;
        };
        if outcome.generation != doc.generation || outcome.identity != doc.reference.identity {
            let stale = ViewerError::StaleDecode {
                got: outcome.generation,
                active: doc.generation,
            };
            debug!(identity = %outcome.identity, "{stale}");
            return;
        }

        let restored = doc.restored;
        match outcome.result {
            Ok(decoded) => {
                doc.backend = Some(decoded.backend);
                doc.base_page_size = decoded.base_page_size.unwrap_or(PageSize::FALLBACK);
                doc.outline = decoded.outline;
                self.view.num_pages = decoded.page_count;
            }
            Err(err) => {
                warn!(
                    ?err,
                    identity = %outcome.identity,
                    "decode failed, continuing with a degraded view"
                );
                doc.backend = None;
                doc.base_page_size = PageSize::FALLBACK;
                doc.outline = Vec::new();
                self.view.num_pages = None;
            }
        }
        doc.decoded = true;
        let outline_empty = doc.outline.is_empty();

        if outline_empty {
            self.view.sidebar_open = false;
            self.view.focus_mode = FocusMode::Document;
        } else if !restored {
            self.view.sidebar_open = true;
        }
        self.reflatten_outline();

        let clamped = self.view.clamp_page(self.view.current_page);
        if clamped != self.view.current_page {
            self.view.current_page = clamped;
            self.scroll_sync = ScrollSync::SnapToPage(Align::Start);
        }
        if let Some(page) = self.initial_page.take() {
            self.view.current_page = self.view.clamp_page(page);
            self.scroll_sync = ScrollSync::SnapToPage(Align::Start);
        }
        debug!(num_pages = ?self.view.num_pages, outline_empty, "document decoded");
        self.sync_scroll();
        self.redraw();
    }

    /// Writes the live state of the active document to its progress record.
    fn snapshot_active(&mut self) {
        let Some(doc) = self.document.as_ref() else {
            return;
        };
        let progress = DocumentProgress::capture(&self.view, &self.history);
        if let Err(err) = save_progress(self.kv.as_ref(), &doc.id, &progress) {
            warn!(?err, identity = %doc.reference.identity, "failed to save reading progress");
        }
    }

    /// Adds `reference` to the front of the recent list, keeping its bytes in the
    /// blob store when it did not come from a path.
    pub fn record_recent(&mut self, reference: &DocumentRef) {
        let evicted = self.recent.record(RecentDocument {
            identity: reference.identity.clone(),
            path: reference.path().map(|path| path.to_path_buf()),
        });
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "recent documents evicted");
        }
        if let Err(err) = self.recent.save(self.kv.as_ref()) {
            warn!(?err, "failed to save recent documents");
        }
        if let DocumentSource::Blob(bytes) = &reference.source {
            if let Err(err) = self.blobs.save(&reference.identity, bytes) {
                warn!(?err, identity = %reference.identity, "failed to keep document bytes");
            }
        }
        if let Err(err) = self.blobs.delete_except(&self.recent.identities()) {
            warn!(?err, "failed to prune stored documents");
        }
    }

    /// Rebuilds a reference to a recent document: from its path when that still
    /// exists, otherwise from the stored bytes.
    pub fn recent_reference(&self, document: &RecentDocument) -> Option<DocumentRef> {
        if let Some(path) = document.path.as_ref().filter(|path| path.exists()) {
            return Some(DocumentRef::from_path(path.clone()));
        }
        match self.blobs.load(&document.identity) {
            Ok(Some(bytes)) => Some(DocumentRef::from_blob(document.identity.clone(), bytes)),
            Ok(None) => {
                warn!(identity = %document.identity, "recent document is no longer available");
                None
            }
            Err(err) => {
                warn!(?err, identity = %document.identity, "failed to load stored document");
                None
            }
        }
    }

    // ---- progress saving ---------------------------------------------------

    /// Debounced write of the reading position; repeated calls push the write
    /// further out.
    pub fn update_progress(&mut self, page: usize, scroll_offset: f32) {
        if !scroll_offset.is_finite() {
            return;
        }
        let Some(doc) = self.document.as_ref() else {
            return;
        };
        self.pending_save = Some(PendingSave {
            due: Instant::now() + self.config.progress_debounce,
            generation: doc.generation,
            page,
            scroll_offset,
        });
    }

    fn schedule_save(&mut self) {
        self.update_progress(self.view.current_page, self.view.scroll_offset);
    }

    pub fn next_save_due(&self) -> Option<Instant> {
        self.pending_save.map(|pending| pending.due)
    }

    /// Flushes the pending progress write if its delay has elapsed.
    pub fn tick(&mut self, now: Instant) {
        match self.pending_save {
            Some(pending) if pending.due <= now => {
                self.pending_save = None;
                self.write_pending(pending);
            }
            _ => {}
        }
    }

    fn write_pending(&mut self, pending: PendingSave) {
        let Some(doc) = self.document.as_ref() else {
            return;
        };
        if pending.generation != doc.generation {
            debug!(
                stamp = pending.generation,
                active = doc.generation,
                "dropping stale progress write"
            );
            return;
        }
        // A zero offset here is the pre-layout default, not a real position.
        if pending.scroll_offset == 0.0 {
            return;
        }
        let mut progress = DocumentProgress::capture(&self.view, &self.history);
        progress.page = pending.page;
        progress.scroll_offset = pending.scroll_offset;
        if let Err(err) = save_progress(self.kv.as_ref(), &doc.id, &progress) {
            warn!(?err, identity = %doc.reference.identity, "failed to save reading progress");
        }
    }

    /// Immediate write of the live state, used on shutdown.
    pub fn flush_progress(&mut self) {
        self.pending_save = None;
        self.snapshot_active();
    }

    // ---- navigation --------------------------------------------------------

    fn current_entry(&self) -> JumpEntry {
        JumpEntry::new(self.view.current_page, self.view.scroll_offset)
    }

    /// History-recording jump: the position before and after the jump are both
    /// pushed. Before layout the landing entry waits for the decoded geometry.
    pub fn jump_to_page(&mut self, page: usize) {
        let target = self.view.clamp_page(page);
        self.history.push(self.current_entry());
        self.set_current_page(target);
        if self.geometry().is_none() {
            if self.scroll_sync == ScrollSync::SnapToPage(Align::Start) {
                self.scroll_sync = ScrollSync::LandJump;
            }
            return;
        }
        self.sync_scroll();
        self.history.push(self.current_entry());
        debug!(page = target, index = self.history.index(), "jumped");
    }

    fn go_to_entry(&mut self, entry: JumpEntry) {
        let page = self.view.clamp_page(entry.page);
        self.view.current_page = page;
        self.view.scroll_offset = entry.scroll_offset.max(0.0);
        self.scroll_sync = ScrollSync::RestoreOffset(entry.scroll_offset);
        self.internal_page_update = false;
        self.schedule_save();
        self.sync_scroll();
        self.redraw();
    }

    pub fn jump_back(&mut self) -> bool {
        match self.history.back() {
            Some(entry) => {
                self.go_to_entry(entry);
                true
            }
            None => false,
        }
    }

    pub fn jump_forward(&mut self) -> bool {
        match self.history.forward() {
            Some(entry) => {
                self.go_to_entry(entry);
                true
            }
            None => false,
        }
    }

    fn realign(&mut self, align: Align) {
        if let Some(geometry) = self.geometry() {
            let offset = geometry.offset_for(self.view.current_page, align);
            self.view.scroll_offset = offset;
            self.scroll_sync = ScrollSync::Idle;
            self.sync_page_from_scroll();
            self.schedule_save();
            self.redraw();
        }
    }

    // ---- outline -----------------------------------------------------------

    fn reflatten_outline(&mut self) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        doc.flat_outline = flatten(&doc.outline, &self.view.expanded_outline_paths);
        let selected_visible = self
            .view
            .selected_outline_path
            .as_deref()
            .map(|path| index_of(&doc.flat_outline, path).is_some())
            .unwrap_or(false);
        if !selected_visible {
            self.view.selected_outline_path =
                doc.flat_outline.first().map(|item| item.path.clone());
        }
        self.follow_outline_selection();
    }

    fn selected_outline_index(&self) -> Option<usize> {
        self.view
            .selected_outline_path
            .as_deref()
            .and_then(|path| index_of(self.outline(), path))
    }

    fn follow_outline_selection(&mut self) {
        let selected = self.selected_outline_index();
        let len = self.outline().len();
        self.outline_window
            .ensure_visible(selected, len, self.viewport.outline_rows);
    }

    fn outline_move(&mut self, delta: isize) {
        let next = step_selection(
            self.outline(),
            self.view.selected_outline_path.as_deref(),
            delta,
        );
        self.select_outline_path(next);
    }

    fn outline_activate(&mut self) {
        let Some(index) = self.selected_outline_index() else {
            return;
        };
        let Some(destination) = self.outline()[index].destination.clone() else {
            return;
        };
        let Some(backend) = self.backend() else {
            warn!(error = %ViewerError::NoActiveDocument, "cannot follow outline entry");
            return;
        };
        match backend.resolve_destination(&destination) {
            Ok(page_index) => self.jump_to_page(page_index + 1),
            Err(err) => warn!(?err, ?destination, "failed to resolve outline destination"),
        }
    }

    fn outline_set_expanded(&mut self, expanded: bool) {
        let Some(index) = self.selected_outline_index() else {
            return;
        };
        let item = &self.outline()[index];
        if item.has_children && item.expanded != expanded {
            let path = item.path.clone();
            self.set_outline_expanded(&path, expanded);
        }
    }

    // ---- dispatch ----------------------------------------------------------

    pub fn toggle_sidebar(&mut self) {
        let open = !self.view.sidebar_open;
        self.set_sidebar_open(open);
        self.set_focus_mode(if open {
            FocusMode::Outline
        } else {
            FocusMode::Document
        });
    }

    fn step_page(&mut self, delta: isize) {
        let page = self.view.current_page as isize + delta;
        if page >= 1 {
            self.set_current_page(page as usize);
        }
    }

    /// Applies one interpreted action.
    pub fn apply(&mut self, action: Action) {
        debug!(?action, "apply");
        let outline_focus =
            self.view.focus_mode == FocusMode::Outline && !self.outline().is_empty();
        match action {
            Action::GotoFirst if outline_focus => {
                let first = self.outline().first().map(|item| item.path.clone());
                self.select_outline_path(first);
            }
            Action::GotoFirst => self.jump_to_page(1),
            Action::GotoLast => {
                if let Some(last) = self.view.num_pages {
                    self.jump_to_page(last);
                }
            }
            Action::GotoPage { page } => self.jump_to_page(page),
            Action::NextPage => self.step_page(1),
            Action::PrevPage => self.step_page(-1),
            Action::Realign { align } if outline_focus => {
                if let Some(selected) = self.selected_outline_index() {
                    let len = self.outline().len();
                    self.outline_window
                        .align(selected, len, self.viewport.outline_rows, align);
                    self.redraw();
                }
            }
            Action::Realign { align } => self.realign(align),
            Action::ToggleSidebar => self.toggle_sidebar(),
            Action::ToggleFitMode => {
                let available = self.available_width();
                let base = self.base_page_size().width;
                self.view.zoom.toggle(available, base);
                self.schedule_save();
                self.redraw();
            }
            Action::SetAbsolute { percent } => {
                let mut zoom = self.view.zoom;
                zoom.set_absolute(percent, self.available_width(), self.base_page_size().width);
                self.set_zoom(zoom);
            }
            Action::SetRelative { percent } => {
                let mut zoom = self.view.zoom;
                zoom.set_relative(percent, self.available_width(), self.base_page_size().width);
                self.set_zoom(zoom);
            }
            Action::FitWidth => {
                let mut zoom = self.view.zoom;
                zoom.fit_width();
                self.set_zoom(zoom);
            }
            Action::FitPage => {
                let base = self.base_page_size();
                let mut zoom = self.view.zoom;
                zoom.fit_page(
                    self.available_width(),
                    self.viewport.height,
                    base.width,
                    base.height,
                );
                self.set_zoom(zoom);
            }
            Action::SetRasterScale { percent } => self.set_render_scale(percent as f32 / 100.0),
            Action::SetTheme(theme) => self.set_theme(theme),
            Action::ToggleFullscreen => self.set_fullscreen(!self.view.fullscreen),
            Action::ToggleHelp => self.set_help_open(!self.view.help_open),
            Action::CloseHelp => self.set_help_open(false),
            Action::FocusDocument => self.set_focus_mode(FocusMode::Document),
            Action::OutlineMove { delta } => self.outline_move(delta),
            Action::OutlineActivate => self.outline_activate(),
            Action::OutlineExpand => self.outline_set_expanded(true),
            Action::OutlineCollapse => self.outline_set_expanded(false),
            Action::JumpBack => {
                self.jump_back();
            }
            Action::JumpForward => {
                self.jump_forward();
            }
            Action::ToggleFinder => self.set_finder_open(!self.view.finder_open),
            Action::OpenPath(path) => {
                if path.exists() {
                    self.open_document(DocumentRef::from_path(path));
                } else {
                    warn!(?path, "cannot open missing file");
                }
            }
            Action::Quit => self.emit(StoreEvent::Quit),
        }
        self.sync_scroll();
    }

    /// Routes a key through the finder or the command interpreter.
    pub fn handle_key(&mut self, input: &KeyInput) {
        if self.view.finder_open {
            self.handle_finder_key(input);
            return;
        }
        let was_normal = self.interpreter.is_normal();
        let action = self.interpreter.interpret(input, self.key_context());
        match action {
            Some(action) => self.apply(action),
            None if was_normal != self.interpreter.is_normal() || !was_normal => self.redraw(),
            None => {}
        }
    }

    fn handle_finder_key(&mut self, input: &KeyInput) {
        let items = self.recent.entries().to_vec();
        match self.finder.handle_key(input, &items) {
            FinderOutcome::Stay => self.redraw(),
            FinderOutcome::Close => self.set_finder_open(false),
            FinderOutcome::Open(document) => {
                self.set_finder_open(false);
                if let Some(reference) = self.recent_reference(&document) {
                    self.open_document(reference);
                }
            }
        }
    }
}
