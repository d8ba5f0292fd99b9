//! # wkhtmlpdf
//!
//! Thread-safe bindings to the wkhtmltox HTML-to-PDF engine.
//!
//! The engine is callback-driven and must be used from a single thread.
//! This crate keeps that thread behind a [`Dispatcher`]: configuration is
//! built anywhere, conversions run on the engine thread, and callbacks are
//! routed back to the observers of the converter that raised them.
//!
//! ## Quick Start
//!
//! ```
//! use wkhtmlpdf::native::NullEngine;
//! use wkhtmlpdf::{Converter, ConverterOptions, Object, ObjectOptions, Runtime};
//!
//! fn main() -> wkhtmlpdf::Result<()> {
//!     // With the `wkhtmltox` feature, use `WkhtmltoxEngine::new` instead.
//!     let runtime = Runtime::start(NullEngine::new)?;
//!
//!     let mut object = Object::from_reader("<h1>Invoice</h1>".as_bytes())?;
//!     object.options = ObjectOptions::new().with_zoom(1.5);
//!
//!     let mut converter = Converter::with_options(ConverterOptions::new().with_title("Invoice"));
//!     converter.add(object);
//!     converter.on_warning(|message| eprintln!("warning: {}", message));
//!
//!     let pdf = runtime.dispatcher().convert(converter)?;
//!     assert!(pdf.starts_with(b"%PDF"));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Typed options**: every engine setting with its native default
//! - **Raw options**: any engine key through `set_option`
//! - **Callback routing**: warnings, errors, phases, progress and completion
//! - **Thread affinity**: native calls only happen on the dispatcher thread
//! - **JSON requests**: decode conversions with [`ConversionRequest`]
//! - **Async**: `submit_async`/`convert_async` with the `async` feature

pub mod context;
pub mod convert;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod native;
pub mod options;
pub mod registry;
pub mod request;

// Re-export commonly used types
pub use context::Context;
pub use convert::{Conversion, ConversionState, Converter, Observers};
pub use dispatch::{Dispatcher, EventLoop, Runtime, RuntimeOptions};
pub use document::Object;
pub use error::{Error, Result};
pub use native::NativeEngine;
#[cfg(feature = "wkhtmltox")]
pub use native::WkhtmltoxEngine;
pub use options::{
    Colorspace, ConverterOptions, ErrorAction, HeaderFooter, ObjectOptions, Orientation,
    PaperSize, Toc,
};
pub use request::{ConversionRequest, ObjectRequest};

/// Convert a JSON request on `dispatcher`.
///
/// # Example
///
/// ```
/// use wkhtmlpdf::native::NullEngine;
/// use wkhtmlpdf::{convert_json, Runtime};
///
/// let runtime = Runtime::start(NullEngine::new).unwrap();
/// let pdf = convert_json(
///     &runtime.dispatcher(),
///     r#"{"url": "https://example.com", "converterOpts": {"title": "Example"}}"#,
/// )
/// .unwrap();
/// assert!(!pdf.is_empty());
/// ```
pub fn convert_json(dispatcher: &Dispatcher, json: &str) -> Result<Vec<u8>> {
    let converter = ConversionRequest::from_json(json)?.into_converter()?;
    dispatcher.convert(converter)
}
