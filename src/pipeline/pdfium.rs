//! Binding to the pdfium shared library.
//!
//! Resolution order, first hit wins:
//!
//! 1. `RewriteConfig::pdfium_lib_path` (file, or directory holding the
//!    platform library name)
//! 2. `PDFIUM_LIB_PATH` environment variable (same rules)
//! 3. the platform library in the current working directory
//! 4. the system library search path
//!
//! Binding happens inside the blocking task that uses it; the returned
//! [`Pdfium`] is dropped with the document at the end of that task.

use crate::error::DocPatchError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bind to pdfium using the resolution order above.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, DocPatchError> {
    let mut tried: Vec<String> = Vec::new();

    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(env_path)
        .map(|p| library_file(&p))
        .chain(std::iter::once(Pdfium::pdfium_platform_library_name_at_path("./")));

    for candidate in candidates {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => tried.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            tried.push(format!("system library: {:?}", e));
            Err(DocPatchError::PdfiumBindingFailed(tried.join("; ")))
        }
    }
}

/// A directory means "the platform library inside it".
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// Map a pdfium load error onto the fatal taxonomy.
pub fn load_error(path: &Path, err: PdfiumError) -> DocPatchError {
    DocPatchError::CorruptDocument {
        path: path.to_path_buf(),
        detail: format!("{:?}", err),
    }
}
