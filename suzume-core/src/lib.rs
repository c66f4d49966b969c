//! Navigation and view-state core of the suzume document viewer.
//!
//! Everything in here is UI-agnostic: the terminal front-end feeds key events and
//! frame ticks in, reads the resulting [`ViewState`] back out, and provides document
//! decoding and persistence through the traits in [`document`] and [`persistence`].

pub mod command;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod finder;
pub mod history;
pub mod input;
pub mod outline;
pub mod persistence;
pub mod progress;
pub mod recent;
pub mod render_cache;
pub mod scale;
pub mod scroll;
pub mod store;
pub mod view;

pub use command::{
    parse_command_line, Action, CommandInterpreter, InputMode, KeyContext, PendingCommand,
};
pub use config::ViewerConfig;
pub use controller::{NavigationController, RepeatCell};
pub use document::{
    decode_document, document_id_for_identity, open_and_decode, DecodeOutcome, DecodedDocument,
    DocumentBackend, DocumentId, DocumentInfo, DocumentProvider, DocumentRef, DocumentSource,
    PageSize, RenderImage, RenderRequest,
};
pub use error::ViewerError;
pub use finder::{FinderOutcome, RecentFinder};
pub use history::{JumpEntry, JumpHistory};
pub use input::{Key, KeyInput, KeyPhase, ModifierKey, Modifiers};
pub use outline::{flatten, Destination, FlatOutlineItem, OutlineNode, OutlineWindow};
pub use persistence::{
    BlobStore, FileBlobStore, FileKeyValueStore, KeyValueStore, MemoryBlobStore,
    MemoryKeyValueStore,
};
pub use progress::DocumentProgress;
pub use recent::{RecentDocument, RecentDocuments};
pub use render_cache::PageCache;
pub use scale::{FitMode, Zoom, ZoomLimits};
pub use scroll::{Align, ScrollGeometry};
pub use store::{StoreEvent, ViewStateStore};
pub use view::{FocusMode, Theme, ViewState, Viewport};
