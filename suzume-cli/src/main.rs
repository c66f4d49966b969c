mod draw;
mod layout;
mod sources;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use suzume_core::{
    config, open_and_decode, BlobStore, DecodeOutcome, DocumentProvider, DocumentRef,
    FileBlobStore, FileKeyValueStore, InputMode, KeyValueStore, NavigationController, PageCache,
    StoreEvent, ViewStateStore, ViewerConfig,
};
use suzume_render::PdfiumProvider;
use suzume_tty::{
    disable_key_release_events, enable_key_release_events, map_key_event, KittyRenderer,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::layout::Screen;

/// Upper bound on how long the loop sleeps waiting for input.
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(
    name = "suzume",
    version,
    about = "keyboard-driven PDF viewer for kitty-compatible terminals"
)]
struct Args {
    /// Page to open the first document on (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Configuration file to use instead of the default location
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Documents to open: paths, file:// URLs, or `-` for stdin. The first one is
    /// shown; the rest are added to the recent list. Without any, the most recent
    /// document is reopened.
    files: Vec<String>,
}

struct RawModeGuard {
    key_releases: bool,
}

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self {
            key_releases: false,
        })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        if self.key_releases {
            let _ = disable_key_release_events(&mut stdout);
        }
        let _ = crossterm::execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0));
        let _ = terminal::disable_raw_mode();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

type DecodeSender = UnboundedSender<DecodeOutcome>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = config::project_dirs()
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;
    let config = ViewerConfig::load(args.config.as_deref())?;

    let data_dir = project_dirs.data_local_dir();
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(data_dir.join("state"))?);
    let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(data_dir.join("documents"))?);
    let mut store = ViewStateStore::new(config, kv, blobs);
    store.hydrate();

    let first = open_arguments(&mut store, &args.files)?;
    if let Some(page) = args.page {
        store.set_initial_page(page);
    }

    let provider: Arc<dyn DocumentProvider> = Arc::new(PdfiumProvider::new()?);
    let (decode_tx, mut decode_rx) = mpsc::unbounded_channel();
    let screen = current_screen()?;
    store.set_viewport(screen.viewport(store.config().sidebar_columns, store.fullscreen()));
    store.open_document(first);

    let mut controller = NavigationController::new(store.config());
    let mut guard = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    guard.key_releases = enable_key_release_events(&mut stdout)?;
    controller.set_release_events(guard.key_releases);
    info!(key_releases = guard.key_releases, "terminal ready");

    let mut renderer = KittyRenderer::new(stdout);
    let cache = PageCache::default();
    let result = run(
        &mut store,
        &mut controller,
        &mut renderer,
        &cache,
        provider,
        &decode_tx,
        &mut decode_rx,
    );

    store.flush_progress();
    renderer.clear_images()?;
    renderer.writer().flush()?;
    drop(guard);
    result
}

/// Queues every argument but the first into the recent list and returns the
/// reference to show first.
fn open_arguments(store: &mut ViewStateStore, files: &[String]) -> Result<DocumentRef> {
    let mut stdin = io::stdin().lock();
    let mut references = files
        .iter()
        .map(|argument| sources::resolve_argument(argument, &mut stdin))
        .collect::<Result<Vec<_>>>()?;

    if references.is_empty() {
        let recent = store
            .recent()
            .most_recent()
            .cloned()
            .ok_or_else(|| anyhow!("no input files provided and no recent documents"))?;
        return store
            .recent_reference(&recent)
            .ok_or_else(|| anyhow!("{} is no longer available", recent.identity));
    }

    let first = references.remove(0);
    for reference in references.iter().rev() {
        store.record_recent(reference);
    }
    Ok(first)
}

fn run(
    store: &mut ViewStateStore,
    controller: &mut NavigationController,
    renderer: &mut KittyRenderer<io::Stdout>,
    cache: &PageCache,
    provider: Arc<dyn DocumentProvider>,
    decode_tx: &DecodeSender,
    decode_rx: &mut UnboundedReceiver<DecodeOutcome>,
) -> Result<()> {
    let mut dirty = true;
    let mut shown_identity: Option<String> = None;

    loop {
        while let Ok(outcome) = decode_rx.try_recv() {
            store.apply_decoded(outcome);
            dirty = true;
        }
        if store.active_identity().map(str::to_owned) != shown_identity {
            cache.clear();
            shown_identity = store.active_identity().map(str::to_owned);
        }

        for event in store.drain_events() {
            match event {
                StoreEvent::DecodeRequested {
                    reference,
                    generation,
                } => spawn_decode(Arc::clone(&provider), reference, generation, decode_tx.clone()),
                StoreEvent::RedrawNeeded => dirty = true,
                StoreEvent::FullscreenToggled(fullscreen) => {
                    debug!(fullscreen, "fullscreen toggled");
                    dirty = true;
                }
                StoreEvent::Quit => return Ok(()),
            }
        }

        let screen = current_screen()?;
        let viewport = screen.viewport(store.config().sidebar_columns, store.fullscreen());
        if *store.viewport() != viewport {
            store.set_viewport(viewport);
            dirty = true;
        }

        if dirty {
            draw::redraw(renderer, store, cache, screen)?;
            dirty = false;
        }

        let now = Instant::now();
        let timeout = controller
            .next_deadline(store)
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(IDLE_POLL)
            .min(IDLE_POLL);

        let before = store.view().clone();
        let input_before = InputSnapshot::of(store);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    controller.handle_key(store, &map_key_event(key), Instant::now())
                }
                Event::Resize(..) => dirty = true,
                _ => {}
            }
        }
        let now = Instant::now();
        controller.on_frame(store, now);
        store.tick(now);

        if *store.view() != before || InputSnapshot::of(store) != input_before {
            dirty = true;
        }
    }
}

/// Input state that is drawn but lives outside [`suzume_core::ViewState`].
#[derive(PartialEq)]
struct InputSnapshot {
    mode: InputMode,
    command_line: String,
    finder_query: String,
    finder_selected: usize,
}

impl InputSnapshot {
    fn of(store: &ViewStateStore) -> Self {
        Self {
            mode: store.interpreter().mode(),
            command_line: store.interpreter().buffer().to_owned(),
            finder_query: store.finder().query().to_owned(),
            finder_selected: store.finder().selected(),
        }
    }
}

fn spawn_decode(
    provider: Arc<dyn DocumentProvider>,
    reference: DocumentRef,
    generation: u64,
    sender: DecodeSender,
) {
    tokio::spawn(async move {
        let outcome = open_and_decode(provider.as_ref(), &reference, generation).await;
        if let Err(err) = &outcome.result {
            warn!(identity = %outcome.identity, %err, "decode failed");
        }
        // The receiver is gone once the viewer has quit.
        let _ = sender.send(outcome);
    });
}

fn current_screen() -> Result<Screen> {
    let window = terminal::window_size()?;
    Ok(Screen::new(
        window.columns,
        window.rows,
        window.width,
        window.height,
    ))
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "suzume.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the viewer, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
