use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use suzume_core::DocumentRef;
use url::Url;

/// Identity given to documents piped in on stdin.
pub const STDIN_IDENTITY: &str = "stdin.pdf";

/// Turns a command-line argument into a document reference. Accepts a plain path,
/// a `file://` URL, or `-` to read the document from `stdin`.
pub fn resolve_argument(argument: &str, stdin: &mut impl Read) -> Result<DocumentRef> {
    if argument == "-" {
        let mut bytes = Vec::new();
        stdin
            .read_to_end(&mut bytes)
            .context("failed to read document from stdin")?;
        if bytes.is_empty() {
            return Err(anyhow!("stdin was empty"));
        }
        return Ok(DocumentRef::from_blob(STDIN_IDENTITY, bytes));
    }

    if argument.starts_with("file:") {
        let url = Url::parse(argument).with_context(|| format!("invalid url {argument}"))?;
        let path = url
            .to_file_path()
            .map_err(|_| anyhow!("{argument} does not name a local file"))?;
        return Ok(DocumentRef::from_path(path));
    }

    Ok(DocumentRef::from_path(PathBuf::from(argument)))
}
