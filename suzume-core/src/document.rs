use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::outline::{Destination, OutlineNode};

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> =
    Lazy::new(|| Uuid::from_u128(0x3f0c9d52_6a7e_5b1f_9c4d_2e8a71b0f6d3));

/// Documents are identified by name only, so two different files sharing a file
/// name map to the same id (and share reading progress).
pub fn document_id_for_identity(identity: &str) -> DocumentId {
    Uuid::new_v5(&*DOCUMENT_NAMESPACE, identity.as_bytes())
}

#[derive(Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Blob(Arc<Vec<u8>>),
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DocumentSource::Blob(bytes) => write!(f, "Blob({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub source: DocumentSource,
    pub identity: String,
}

impl DocumentRef {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identity = identity_for_path(&path);
        Self {
            source: DocumentSource::Path(path),
            identity,
        }
    }

    pub fn from_blob(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source: DocumentSource::Blob(Arc::new(bytes)),
            identity: name.into(),
        }
    }

    pub fn id(&self) -> DocumentId {
        document_id_for_identity(&self.identity)
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            DocumentSource::Path(path) => Some(path),
            DocumentSource::Blob(_) => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.source {
            DocumentSource::Path(_) => None,
            DocumentSource::Blob(bytes) => Some(bytes.as_slice()),
        }
    }
}

fn identity_for_path(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Used until (or instead of, when decoding fails) the real first page size.
    pub const FALLBACK: PageSize = PageSize {
        width: 600.0,
        height: 800.0,
    };

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub identity: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest {
    pub page_index: usize,
    pub scale: f32,
    pub dark_mode: bool,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            scale: 1.0,
            dark_mode: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    fn page_size(&self, page_index: usize) -> Result<PageSize>;
    fn outline(&self) -> Result<Vec<OutlineNode>>;
    /// Returns the 0-based page index a destination points at.
    fn resolve_destination(&self, destination: &Destination) -> Result<usize>;
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage>;
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, reference: &DocumentRef) -> Result<Arc<dyn DocumentBackend>>;
}

pub struct DecodedDocument {
    pub backend: Arc<dyn DocumentBackend>,
    pub page_count: Option<usize>,
    pub base_page_size: Option<PageSize>,
    pub outline: Vec<OutlineNode>,
}

impl fmt::Debug for DecodedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedDocument")
            .field("identity", &self.backend.info().identity)
            .field("page_count", &self.page_count)
            .field("base_page_size", &self.base_page_size)
            .field("outline_roots", &self.outline.len())
            .finish()
    }
}

/// Result of an asynchronous open+decode, stamped with the generation of the
/// `open_document` call that requested it.
#[derive(Debug)]
pub struct DecodeOutcome {
    pub generation: u64,
    pub identity: String,
    pub result: Result<DecodedDocument>,
}

/// Collects the metadata the view needs. Failures past the page count degrade to
/// "unknown" rather than failing the whole decode.
pub fn decode_document(backend: Arc<dyn DocumentBackend>) -> DecodedDocument {
    let info = backend.info().clone();
    let page_count = (info.page_count > 0).then_some(info.page_count);

    let base_page_size = match page_count {
        Some(_) => match backend.page_size(0) {
            Ok(size) if size.is_valid() => Some(size),
            Ok(size) => {
                warn!(identity = %info.identity, ?size, "ignoring degenerate page size");
                None
            }
            Err(err) => {
                warn!(?err, identity = %info.identity, "failed to read first page size");
                None
            }
        },
        None => None,
    };

    let outline = match backend.outline() {
        Ok(outline) => outline,
        Err(err) => {
            warn!(?err, identity = %info.identity, "failed to extract outline");
            Vec::new()
        }
    };

    DecodedDocument {
        backend,
        page_count,
        base_page_size,
        outline,
    }
}

#[instrument(skip(provider, reference), fields(identity = %reference.identity))]
pub async fn open_and_decode<P>(
    provider: &P,
    reference: &DocumentRef,
    generation: u64,
) -> DecodeOutcome
where
    P: DocumentProvider + ?Sized,
{
    let result = provider.open(reference).await.map(decode_document);
    DecodeOutcome {
        generation,
        identity: reference.identity.clone(),
        result,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::ViewerError;
    use anyhow::anyhow;

    pub struct FakeBackend {
        pub info: DocumentInfo,
        pub size: PageSize,
        pub outline: Vec<OutlineNode>,
        pub fail_outline: bool,
    }

    impl FakeBackend {
        pub fn new(identity: &str, page_count: usize) -> Self {
            Self {
                info: DocumentInfo {
                    id: document_id_for_identity(identity),
                    identity: identity.to_string(),
                    page_count,
                },
                size: PageSize {
                    width: 600.0,
                    height: 800.0,
                },
                outline: Vec::new(),
                fail_outline: false,
            }
        }

        pub fn with_outline(mut self, outline: Vec<OutlineNode>) -> Self {
            self.outline = outline;
            self
        }
    }

    impl DocumentBackend for FakeBackend {
        fn info(&self) -> &DocumentInfo {
            &self.info
        }

        fn page_size(&self, page_index: usize) -> Result<PageSize> {
            if page_index >= self.info.page_count {
                return Err(ViewerError::PageOutOfRange {
                    page: page_index + 1,
                    page_count: self.info.page_count,
                }
                .into());
            }
            Ok(self.size)
        }

        fn outline(&self) -> Result<Vec<OutlineNode>> {
            if self.fail_outline {
                return Err(anyhow!("outline stream is corrupt"));
            }
            Ok(self.outline.clone())
        }

        fn resolve_destination(&self, destination: &Destination) -> Result<usize> {
            match destination {
                Destination::Page(index) if *index < self.info.page_count => Ok(*index),
                other => Err(ViewerError::UnresolvedDestination(other.clone()).into()),
            }
        }

        fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
            Ok(RenderImage {
                width: 1,
                height: 1,
                pixels: vec![request.page_index as u8, 0, 0, 255],
            })
        }
    }

    pub fn decoded(
        identity: &str,
        page_count: usize,
        outline: Vec<OutlineNode>,
    ) -> DecodedDocument {
        decode_document(Arc::new(FakeBackend::new(identity, page_count).with_outline(outline)))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;

    struct FakeProvider;

    #[async_trait::async_trait]
    impl DocumentProvider for FakeProvider {
        async fn open(&self, reference: &DocumentRef) -> Result<Arc<dyn DocumentBackend>> {
            if reference.identity.ends_with(".broken") {
                anyhow::bail!("not a document");
            }
            Ok(Arc::new(FakeBackend::new(&reference.identity, 12)))
        }
    }

    #[test]
    fn identity_is_the_file_name() {
        let reference = DocumentRef::from_path("/tmp/books/paper.pdf");
        assert_eq!(reference.identity, "paper.pdf");
        let other = DocumentRef::from_path("/elsewhere/paper.pdf");
        assert_eq!(reference.id(), other.id());
    }

    #[test]
    fn blob_reference_exposes_bytes() {
        let reference = DocumentRef::from_blob("notes.pdf", vec![1, 2, 3]);
        assert_eq!(reference.bytes(), Some(&[1u8, 2, 3][..]));
        assert!(reference.path().is_none());
    }

    #[test]
    fn outline_failure_degrades_to_empty() {
        let mut backend = FakeBackend::new("a.pdf", 3);
        backend.fail_outline = true;
        let decoded = decode_document(Arc::new(backend));
        assert_eq!(decoded.page_count, Some(3));
        assert!(decoded.outline.is_empty());
        assert!(decoded.base_page_size.is_some());
    }

    #[test]
    fn empty_document_has_unknown_page_count() {
        let decoded = decode_document(Arc::new(FakeBackend::new("empty.pdf", 0)));
        assert_eq!(decoded.page_count, None);
        assert_eq!(decoded.base_page_size, None);
    }

    #[tokio::test]
    async fn open_and_decode_stamps_generation() {
        let reference = DocumentRef::from_path("/tmp/a.pdf");
        let outcome = open_and_decode(&FakeProvider, &reference, 7).await;
        assert_eq!(outcome.generation, 7);
        assert_eq!(outcome.identity, "a.pdf");
        assert_eq!(outcome.result.unwrap().page_count, Some(12));

        let broken = DocumentRef::from_path("/tmp/a.broken");
        let outcome = open_and_decode(&FakeProvider, &broken, 8).await;
        assert!(outcome.result.is_err());
    }
}
