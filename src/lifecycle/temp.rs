//! Temporary input documents.

use std::io::{self, Read, Write};
use std::path::Path;

use tempfile::TempPath;

/// HTML document materialized from a reader into a temporary file.
///
/// The file is deleted exactly once: by [`destroy`](TempInput::destroy) or,
/// failing that, when the value is dropped.
#[derive(Debug)]
pub struct TempInput {
    path: Option<TempPath>,
}

impl TempInput {
    /// Copy `reader` into a new temporary `.html` file.
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("pdf-")
            .suffix(".html")
            .tempfile()?;
        io::copy(&mut reader, &mut file)?;
        file.flush()?;

        let path = file.into_temp_path();
        log::debug!("materialized input at {}", path.display());
        Ok(Self { path: Some(path) })
    }

    /// Path of the file, `None` once destroyed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the file has been deleted.
    pub fn is_destroyed(&self) -> bool {
        self.path.is_none()
    }

    /// Delete the file. Later calls are no-ops.
    pub fn destroy(&mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => path.close(),
            None => Ok(()),
        }
    }
}

impl Drop for TempInput {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::warn!("failed to remove temporary input: {}", e);
        }
    }
}
