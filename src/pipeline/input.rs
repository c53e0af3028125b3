//! Input resolution: turn a user-supplied path into a loaded [`Document`].
//!
//! The format is decided by extension before the file is touched, so an
//! unsupported file fails with `UnsupportedFormat` even when it is also
//! unreadable. Magic bytes are checked for PDF (`%PDF`) and DOCX (`PK` zip
//! header) so callers get a `CorruptDocument` rather than a parser crash.

use crate::error::DocPatchError;
use crate::fragment::DocumentFormat;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A document loaded into memory, tagged with its format.
///
/// Holding the bytes rather than an open handle means nothing needs closing
/// on error paths: parsers borrow the buffer and release it on return.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Wrap bytes that did not come from disk. `name` decides the format.
    pub fn from_bytes(name: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, DocPatchError> {
        let path = name.into();
        let format = DocumentFormat::from_path(&path)?;
        let doc = Self {
            path,
            format,
            bytes,
        };
        doc.check_magic()?;
        Ok(doc)
    }

    /// Verify the leading bytes match the format claimed by the extension.
    fn check_magic(&self) -> Result<(), DocPatchError> {
        let expected: &[u8] = match self.format {
            DocumentFormat::Pdf => b"%PDF",
            DocumentFormat::Docx => b"PK",
            DocumentFormat::Latex => return Ok(()),
        };
        if self.bytes.starts_with(expected) {
            return Ok(());
        }
        let head: Vec<u8> = self.bytes.iter().take(4).copied().collect();
        Err(DocPatchError::CorruptDocument {
            path: self.path.clone(),
            detail: format!(
                "expected a {} file starting with {:?}, found {:?}",
                self.format,
                String::from_utf8_lossy(expected),
                head
            ),
        })
    }

    /// Decode a LaTeX source buffer.
    pub fn as_utf8(&self) -> Result<&str, DocPatchError> {
        std::str::from_utf8(&self.bytes).map_err(|e| DocPatchError::InvalidUtf8 {
            path: self.path.clone(),
            offset: e.valid_up_to(),
        })
    }
}

/// Read a local document, validating format, existence, and permissions.
pub async fn load_document(path: impl AsRef<Path>) -> Result<Document, DocPatchError> {
    let path = path.as_ref().to_path_buf();
    let format = DocumentFormat::from_path(&path)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocPatchError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DocPatchError::FileNotFound { path });
        }
        Err(e) => {
            return Err(DocPatchError::CorruptDocument {
                path,
                detail: e.to_string(),
            });
        }
    };

    debug!("Loaded {} document: {} ({} bytes)", format, path.display(), bytes.len());
    let doc = Document {
        path,
        format,
        bytes,
    };
    doc.check_magic()?;
    Ok(doc)
}

/// `<dir>/<stem><suffix>.<ext>` next to the input.
///
/// `cv.docx` + `_modified` → `cv_modified.docx`.
pub fn derive_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    input.with_file_name(file_name)
}
