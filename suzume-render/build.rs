//! Points the `pdf` feature at a local pdfium build.
//!
//! Set `SUZUME_PDFIUM_DIR` to an unpacked pdfium release (for example one from
//! bblanchon/pdfium-binaries) and the library inside it is baked in as
//! `SUZUME_PDFIUM_LIBRARY_PATH`. Without it the viewer binds at runtime to a pdfium
//! next to the working directory or installed on the system.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

const PDFIUM_DIR_VAR: &str = "SUZUME_PDFIUM_DIR";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed={PDFIUM_DIR_VAR}");

    if env::var_os("CARGO_FEATURE_PDF").is_none() {
        return;
    }
    let Some(root) = env::var_os(PDFIUM_DIR_VAR).map(PathBuf::from) else {
        return;
    };

    match find_library(&root) {
        Ok(library) => {
            println!("cargo:rerun-if-changed={}", library.display());
            println!("cargo:rustc-env=SUZUME_PDFIUM_LIBRARY_PATH={}", library.display());
        }
        Err(err) => println!("cargo:warning=ignoring {PDFIUM_DIR_VAR}: {err:#}"),
    }
}

/// Library file name pdfium ships under on the target platform.
fn library_name() -> Result<&'static str> {
    let os = env::var("CARGO_CFG_TARGET_OS").context("target os not reported by cargo")?;
    Ok(match os.as_str() {
        "windows" => "pdfium.dll",
        "macos" | "ios" => "libpdfium.dylib",
        _ => "libpdfium.so",
    })
}

/// Release archives keep the library under `lib/` or `bin/`, so search the tree.
fn find_library(root: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let name = library_name()?;
    WalkDir::new(root)
        .max_depth(4)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .map(|entry| entry.into_path())
        .with_context(|| format!("no {name} under {}", root.display()))
}
