//! Conversion orchestration.
//!
//! A [`Conversion`] drives one attempt through the native engine:
//!
//! ```text
//! Idle -> OptionsApplied -> Converting -> OutputRetrieved -> Destroyed
//! ```
//!
//! Any error moves it to `Failed` and releases its native resources.
//! `destroy` is valid from every state and runs on drop.
//!
//! # Example
//!
//! ```
//! use wkhtmlpdf::convert::{Conversion, ConversionState};
//! use wkhtmlpdf::native::NullEngine;
//! use wkhtmlpdf::{Context, Converter, Error};
//!
//! let ctx = Context::initialize(NullEngine::new()).unwrap();
//! let converter = Converter::new();
//!
//! let mut conversion = Conversion::new(&ctx, &converter).unwrap();
//! assert!(matches!(conversion.apply_options(), Err(Error::NoObjects)));
//! assert_eq!(conversion.state(), ConversionState::Failed);
//! ```

mod converter;
mod observers;

pub use converter::Converter;
pub use observers::Observers;

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::lifecycle::{GlobalSettings, NativeConverter, ObjectSettings};
use crate::native::NativeEngine;
use crate::options::{apply_ops, apply_raw, ConverterOptions};
use crate::registry::HandleRegistry;

/// State of a [`Conversion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    /// Created, nothing applied yet.
    Idle,
    /// Settings applied and the native converter created.
    OptionsApplied,
    /// The native conversion ran.
    Converting,
    /// The output buffer was copied out.
    OutputRetrieved,
    /// Resources released by `destroy`.
    Destroyed,
    /// A step failed and resources were released.
    Failed,
}

impl ConversionState {
    /// Human-readable state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionState::Idle => "idle",
            ConversionState::OptionsApplied => "options applied",
            ConversionState::Converting => "converting",
            ConversionState::OutputRetrieved => "output retrieved",
            ConversionState::Destroyed => "destroyed",
            ConversionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversion attempt of a [`Converter`].
pub struct Conversion<'c> {
    converter: &'c Converter,
    engine: Rc<dyn NativeEngine>,
    registry: Arc<HandleRegistry<Observers>>,
    global: Option<GlobalSettings>,
    objects: Vec<ObjectSettings>,
    native: Option<NativeConverter>,
    state: ConversionState,
}

impl<'c> Conversion<'c> {
    /// Start a conversion of `converter` in `ctx`.
    pub fn new(ctx: &Context, converter: &'c Converter) -> Result<Self> {
        Ok(Self {
            converter,
            engine: Rc::clone(ctx.engine()?),
            registry: Arc::clone(ctx.registry()?),
            global: None,
            objects: Vec::new(),
            native: None,
            state: ConversionState::Idle,
        })
    }

    /// Current state.
    pub fn state(&self) -> ConversionState {
        self.state
    }

    /// Descriptions of the conversion phases, empty before options are applied.
    pub fn phases(&self) -> &[String] {
        self.native.as_ref().map(|n| n.phases()).unwrap_or(&[])
    }

    /// Apply converter and document options and create the native converter.
    ///
    /// Converter settings come first and end with the in-memory output
    /// selector; each document's settings follow in insertion order.
    pub fn apply_options(&mut self) -> Result<()> {
        self.require(ConversionState::Idle)?;
        if self.converter.objects().is_empty() {
            return self.fail(Error::NoObjects);
        }

        match self.build() {
            Ok(()) => {
                self.state = ConversionState::OptionsApplied;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn build(&mut self) -> Result<()> {
        let converter = self.converter;

        let mut global = GlobalSettings::create(&self.engine)?;
        apply_ops(&converter.options.field_ops(), &mut global)?;
        apply_raw(converter.overrides(), &mut global)?;
        apply_ops(&[ConverterOptions::output_op()], &mut global)?;
        let global = self.global.insert(global);

        for object in converter.objects() {
            let mut settings = ObjectSettings::create(&self.engine)?;
            apply_ops(&object.ops(), &mut settings)?;
            apply_raw(object.overrides(), &mut settings)?;
            self.objects.push(settings);
        }

        let observers = Arc::new(converter.observers().clone());
        let mut native = NativeConverter::create(&self.engine, &self.registry, global, observers)?;
        for settings in &mut self.objects {
            native.add_object(settings)?;
        }
        self.native = Some(native);
        Ok(())
    }

    /// Run the native conversion.
    pub fn convert(&mut self) -> Result<()> {
        self.require(ConversionState::OptionsApplied)?;
        self.state = ConversionState::Converting;

        let result = match self.native.as_mut() {
            Some(native) => native.convert(),
            None => Err(Error::Destroyed("converter")),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    /// Copy the converted document out of the engine.
    pub fn output(&mut self) -> Result<Vec<u8>> {
        self.require(ConversionState::Converting)?;

        let result = match self.native.as_ref() {
            Some(native) => native.output(),
            None => Err(Error::Destroyed("converter")),
        };
        match result {
            Ok(output) => {
                self.state = ConversionState::OutputRetrieved;
                Ok(output)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Release every native resource. Later calls are no-ops.
    pub fn destroy(&mut self) {
        self.release();
        self.state = ConversionState::Destroyed;
    }

    fn release(&mut self) {
        // Unregisters and frees adopted settings together with the converter.
        if let Some(mut native) = self.native.take() {
            native.destroy();
        }
        if let Some(mut global) = self.global.take() {
            global.destroy();
        }
        for mut settings in self.objects.drain(..) {
            settings.destroy();
        }
    }

    fn require(&self, expected: ConversionState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn fail<T>(&mut self, error: Error) -> Result<T> {
        log::debug!("conversion failed while {}: {}", self.state, error);
        self.release();
        self.state = ConversionState::Failed;
        Err(error)
    }
}

impl Drop for Conversion<'_> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Conversion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversion")
            .field("state", &self.state)
            .field("objects", &self.converter.objects().len())
            .field("native", &self.native)
            .finish()
    }
}
