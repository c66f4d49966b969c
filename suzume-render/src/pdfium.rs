use std::convert::TryFrom;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use suzume_core::{
    Destination, DocumentBackend, DocumentInfo, DocumentProvider, DocumentRef, DocumentSource,
    OutlineNode, PageSize, RenderImage, RenderRequest, ViewerError,
};
use tracing::{debug, instrument, warn};

use crate::invert_pixels;

/// Opens PDF documents with a shared pdfium binding.
pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
}

impl PdfiumProvider {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_build_hint() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumProvider {
    #[instrument(skip(self, reference), fields(identity = %reference.identity))]
    async fn open(&self, reference: &DocumentRef) -> Result<Arc<dyn DocumentBackend>> {
        let document = PdfiumDocument::load(Arc::clone(&self.pdfium), reference)?;
        debug!(pages = document.info.page_count, "opened pdf");
        Ok(Arc::new(document))
    }
}

struct PdfiumDocument {
    info: DocumentInfo,
    outline_cache: Mutex<Option<Vec<OutlineNode>>>,
    // Declared before `_pdfium` so it drops first.
    document: Mutex<PdfDocument<'static>>,
    _pdfium: Arc<Pdfium>,
}

impl PdfiumDocument {
    fn load(pdfium: Arc<Pdfium>, reference: &DocumentRef) -> Result<Self> {
        let document = match &reference.source {
            DocumentSource::Path(path) => {
                let absolute: PathBuf = path
                    .canonicalize()
                    .with_context(|| format!("failed to resolve path for {:?}", path))?;
                pdfium
                    .load_pdf_from_file(&absolute, None)
                    .with_context(|| format!("failed to open {:?}", absolute))?
            }
            DocumentSource::Blob(bytes) => pdfium
                .load_pdf_from_byte_vec(bytes.to_vec(), None)
                .with_context(|| format!("failed to open {}", reference.identity))?,
        };
        // SAFETY: the document borrows the bindings owned by `pdfium`, which this
        // struct keeps alive and drops after `document` (fields drop in declaration
        // order).
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        let page_count = usize::from(document.pages().len());
        Ok(Self {
            info: DocumentInfo {
                id: reference.id(),
                identity: reference.identity.clone(),
                page_count,
            },
            outline_cache: Mutex::new(None),
            document: Mutex::new(document),
            _pdfium: pdfium,
        })
    }

    fn page_index(&self, page_index: usize) -> Result<PdfPageIndex> {
        if page_index >= self.info.page_count {
            return Err(ViewerError::PageOutOfRange {
                page: page_index + 1,
                page_count: self.info.page_count,
            }
            .into());
        }
        PdfPageIndex::try_from(page_index)
            .map_err(|_| anyhow!("page {} is out of supported range", page_index))
    }
}

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_size(&self, page_index: usize) -> Result<PageSize> {
        let index = self.page_index(page_index)?;
        let document = self.document.lock();
        let page = document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range", page_index))?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn outline(&self) -> Result<Vec<OutlineNode>> {
        if let Some(cached) = self.outline_cache.lock().as_ref() {
            return Ok(cached.clone());
        }
        let outline = {
            let document = self.document.lock();
            let bookmarks = document.bookmarks();
            match bookmarks.root() {
                Some(root) => collect_siblings(root),
                None => Vec::new(),
            }
        };
        *self.outline_cache.lock() = Some(outline.clone());
        Ok(outline)
    }

    fn resolve_destination(&self, destination: &Destination) -> Result<usize> {
        match destination {
            Destination::Page(index) if *index < self.info.page_count => Ok(*index),
            other => Err(ViewerError::UnresolvedDestination(other.clone()).into()),
        }
    }

    #[instrument(skip(self), fields(identity = %self.info.identity))]
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
        let index = self.page_index(request.page_index)?;
        let document = self.document.lock();
        let page = document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range", request.page_index))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(request.scale.max(0.1));
        let bitmap = page
            .render_with_config(&config)
            .with_context(|| format!("failed to render page {}", request.page_index))?;
        let mut pixels = bitmap.as_image().to_rgba8().into_raw();
        if request.dark_mode {
            invert_pixels(&mut pixels);
        }

        Ok(RenderImage {
            width: u32::try_from(bitmap.width()).unwrap_or_default(),
            height: u32::try_from(bitmap.height()).unwrap_or_default(),
            pixels,
        })
    }
}

/// Walks a bookmark and its following siblings into outline nodes. Entries without
/// a resolvable page keep their place in the tree with no destination.
fn collect_siblings(first: PdfBookmark<'_>) -> Vec<OutlineNode> {
    let mut nodes = Vec::new();
    let mut current = Some(first);
    while let Some(bookmark) = current {
        let destination = bookmark
            .destination()
            .and_then(|destination| destination.page_index().ok())
            .map(|index| Destination::Page(usize::from(index)));
        let children = bookmark
            .first_child()
            .map(collect_siblings)
            .unwrap_or_default();
        let title = bookmark.title().unwrap_or_default();
        nodes.push(OutlineNode::new(title, destination).with_children(children));
        current = bookmark.next_sibling();
    }
    nodes
}

fn bind_pdfium_from_build_hint() -> Option<Pdfium> {
    match option_env!("SUZUME_PDFIUM_LIBRARY_PATH") {
        Some(path) if !path.is_empty() => match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!(path, %err, "failed to load pdfium from build-provided path");
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}
