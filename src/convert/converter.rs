//! HTML-to-PDF converter.

use crate::context::Context;
use crate::document::Object;
use crate::error::Result;
use crate::options::{option_name, ConverterOptions};

use super::{Conversion, Observers};

/// Collects documents and options for one conversion.
///
/// A converter is plain data and can be built on any thread. Running it
/// requires a [`Context`], which only exists on the dispatcher thread; use
/// [`Dispatcher::convert`](crate::Dispatcher::convert) from elsewhere.
///
/// # Example
///
/// ```
/// use wkhtmlpdf::{Converter, ConverterOptions, Object, Orientation};
///
/// let mut converter = Converter::with_options(
///     ConverterOptions::new()
///         .with_title("Report")
///         .with_orientation(Orientation::Landscape),
/// );
/// converter.add(Object::new("https://example.com").unwrap());
/// converter.on_progress_changed(|percent| println!("{}%", percent));
///
/// assert_eq!(converter.objects().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Converter {
    /// Converter-level options.
    pub options: ConverterOptions,

    objects: Vec<Object>,
    overrides: Vec<(String, String)>,
    observers: Observers,
}

impl Converter {
    /// Create a converter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a converter with the given options.
    pub fn with_options(options: ConverterOptions) -> Self {
        Self {
            options,
            objects: Vec::new(),
            overrides: Vec::new(),
            observers: Observers::default(),
        }
    }

    /// Append a document. Documents are rendered in insertion order.
    pub fn add(&mut self, object: Object) -> &mut Self {
        self.objects.push(object);
        self
    }

    /// Added documents.
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Set a raw engine option, applied after the typed options.
    pub fn set_option(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let name = option_name(name)?;
        self.overrides.push((name.to_string(), value.into()));
        Ok(())
    }

    /// Raw options in the order they were set.
    pub fn overrides(&self) -> &[(String, String)] {
        &self.overrides
    }

    /// Registered observers.
    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    /// Replace all observers.
    pub fn set_observers(&mut self, observers: Observers) -> &mut Self {
        self.observers = observers;
        self
    }

    /// Called with each warning message.
    pub fn on_warning(&mut self, f: impl Fn(&str) + Send + Sync + 'static) -> &mut Self {
        self.observers.on_warning(f);
        self
    }

    /// Called with each error message.
    pub fn on_error(&mut self, f: impl Fn(&str) + Send + Sync + 'static) -> &mut Self {
        self.observers.on_error(f);
        self
    }

    /// Called with the index and description of each new phase.
    pub fn on_phase_changed(
        &mut self,
        f: impl Fn(usize, &str) + Send + Sync + 'static,
    ) -> &mut Self {
        self.observers.on_phase_changed(f);
        self
    }

    /// Called with the progress of the current phase, in percent.
    pub fn on_progress_changed(&mut self, f: impl Fn(u8) + Send + Sync + 'static) -> &mut Self {
        self.observers.on_progress_changed(f);
        self
    }

    /// Called once the conversion finished, with its outcome.
    pub fn on_finished(&mut self, f: impl Fn(bool) + Send + Sync + 'static) -> &mut Self {
        self.observers.on_finished(f);
        self
    }

    /// Convert all documents and return the PDF bytes.
    ///
    /// Native resources and temporary inputs are released whatever the
    /// outcome.
    pub fn run(mut self, ctx: &mut Context) -> Result<Vec<u8>> {
        let result = self.convert(ctx);
        self.destroy();
        result
    }

    fn convert(&self, ctx: &Context) -> Result<Vec<u8>> {
        let mut conversion = Conversion::new(ctx, self)?;
        conversion.apply_options()?;
        conversion.convert()?;
        let output = conversion.output()?;
        conversion.destroy();

        log::info!(
            "converted {} object(s) into {} bytes",
            self.objects.len(),
            output.len()
        );
        Ok(output)
    }

    /// Release every document. Later calls are no-ops.
    ///
    /// Temporary file errors are logged, never returned.
    pub fn destroy(&mut self) {
        for mut object in self.objects.drain(..) {
            if let Err(e) = object.destroy() {
                log::warn!("failed to release {}: {}", object.location(), e);
            }
        }
    }
}

impl Drop for Converter {
    fn drop(&mut self) {
        self.destroy();
    }
}
