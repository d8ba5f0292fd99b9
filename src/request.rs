//! Conversion requests decoded from JSON.
//!
//! Two shapes are accepted and may be mixed:
//!
//! ```json
//! {
//!   "converterOpts": { "title": "Report", "paperSize": "A4" },
//!   "objectOpts": { "location": "https://example.com", "footer": { "contentCenter": "[page]" } }
//! }
//! ```
//!
//! ```json
//! {
//!   "url": "https://example.com",
//!   "converterOptions": { "orientation": "Landscape" },
//!   "objectOptions": { "web.loadImages": "false" }
//! }
//! ```
//!
//! Typed options keep their defaults where unspecified. Raw option maps are
//! applied after the typed options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::convert::Converter;
use crate::document::Object;
use crate::error::{Error, Result};
use crate::options::{ConverterOptions, ObjectOptions};

/// Typed options for the single document of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectRequest {
    /// File path or URL of the document.
    pub location: String,

    /// Per-document options.
    #[serde(flatten)]
    pub options: ObjectOptions,
}

/// A single-document conversion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionRequest {
    /// Document location, used when `objectOpts.location` is empty.
    pub url: String,

    /// Typed converter options.
    pub converter_opts: ConverterOptions,

    /// Typed document options.
    pub object_opts: ObjectRequest,

    /// Raw converter options.
    pub converter_options: BTreeMap<String, String>,

    /// Raw document options.
    pub object_options: BTreeMap<String, String>,
}

impl ConversionRequest {
    /// Decode a request from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode a request from a JSON reader.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Location of the document to convert.
    pub fn location(&self) -> &str {
        let location = self.object_opts.location.trim();
        if location.is_empty() {
            self.url.trim()
        } else {
            location
        }
    }

    /// Build a converter holding the request's document.
    pub fn into_converter(self) -> Result<Converter> {
        let location = self.location().to_string();
        if location.is_empty() {
            return Err(Error::EmptyLocation);
        }

        let mut object = Object::with_options(location, self.object_opts.options)?;
        for (name, value) in self.object_options {
            object.set_option(&name, value)?;
        }

        let mut converter = Converter::with_options(self.converter_opts);
        for (name, value) in self.converter_options {
            converter.set_option(&name, value)?;
        }
        converter.add(object);

        log::debug!(
            "built converter from request for {}",
            converter.objects()[0].location()
        );
        Ok(converter)
    }
}
