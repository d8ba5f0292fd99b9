//! Documents added to a conversion.

use std::io::Read;

use crate::error::{Error, Result};
use crate::lifecycle::TempInput;
use crate::options::{option_name, ObjectOptions, SetOp};

/// A document to convert: a file path, a URL or materialized HTML.
///
/// Objects are plain data until a conversion applies them to native
/// settings. An object created from a reader owns a temporary file that is
/// removed by [`destroy`](Object::destroy) or when the object is dropped.
///
/// # Example
///
/// ```
/// use wkhtmlpdf::{ErrorAction, Object, ObjectOptions};
///
/// let mut object = Object::with_options(
///     "https://example.com",
///     ObjectOptions::new().with_error_action(ErrorAction::Skip),
/// )
/// .unwrap();
/// object.options.zoom = 1.5;
///
/// assert_eq!(object.location(), "https://example.com");
/// ```
#[derive(Debug)]
pub struct Object {
    location: String,

    /// Per-document options.
    pub options: ObjectOptions,

    overrides: Vec<(String, String)>,
    input: Option<TempInput>,
}

impl Object {
    /// Create an object for a file path or URL with default options.
    pub fn new(location: impl Into<String>) -> Result<Self> {
        Self::with_options(location, ObjectOptions::default())
    }

    /// Create an object for a file path or URL.
    pub fn with_options(location: impl Into<String>, options: ObjectOptions) -> Result<Self> {
        let location = location.into();
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::EmptyLocation);
        }

        Ok(Self {
            location: location.to_string(),
            options,
            overrides: Vec::new(),
            input: None,
        })
    }

    /// Create an object from HTML read from `reader`, with default options.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, ObjectOptions::default())
    }

    /// Create an object from HTML read from `reader`.
    pub fn from_reader_with_options<R: Read>(reader: R, options: ObjectOptions) -> Result<Self> {
        let input = TempInput::from_reader(reader)?;
        let location = input
            .path()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut object = Self::with_options(location, options)?;
        object.input = Some(input);
        Ok(object)
    }

    /// Location passed to the engine as `page`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Whether the object owns a temporary input file.
    pub fn is_temporary(&self) -> bool {
        self.input.is_some()
    }

    /// Set a raw engine option, applied after the typed options.
    ///
    /// The name is trimmed; empty names are rejected.
    pub fn set_option(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let name = option_name(name)?;
        self.overrides.push((name.to_string(), value.into()));
        Ok(())
    }

    /// Raw options in the order they were set.
    pub fn overrides(&self) -> &[(String, String)] {
        &self.overrides
    }

    /// Native setting operations, starting with `page`.
    pub fn ops(&self) -> Vec<SetOp<'_>> {
        self.options.ops(&self.location)
    }

    /// Remove the temporary input file, if any. Later calls are no-ops.
    pub fn destroy(&mut self) -> Result<()> {
        if let Some(input) = self.input.as_mut() {
            input.destroy()?;
        }
        Ok(())
    }
}
