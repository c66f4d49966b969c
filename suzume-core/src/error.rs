use thiserror::Error;

use crate::outline::Destination;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("destination {0:?} does not resolve to a page")]
    UnresolvedDestination(Destination),
    #[error("no document is open")]
    NoActiveDocument,
    #[error("decode for generation {got} arrived while generation {active} is active")]
    StaleDecode { got: u64, active: u64 },
}
