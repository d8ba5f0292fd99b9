//! Main-thread dispatch.
//!
//! The native engine must be driven from a single thread. That thread owns
//! the [`Context`] and runs an [`EventLoop`]; every other thread hands work
//! to it through a [`Dispatcher`] and blocks until the result comes back.
//!
//! Jobs run one at a time in submission order. The queue is bounded: when
//! it is full, [`Dispatcher::submit`] blocks until the loop catches up.
//!
//! # Example
//!
//! ```
//! use wkhtmlpdf::native::NullEngine;
//! use wkhtmlpdf::{Converter, Object, Runtime};
//!
//! let runtime = Runtime::start(NullEngine::new).unwrap();
//! let dispatcher = runtime.dispatcher();
//!
//! let version = dispatcher.submit(|ctx| ctx.version()).unwrap();
//! assert!(version.contains("null"));
//!
//! let mut converter = Converter::new();
//! converter.add(Object::from_reader("<h1>Hello</h1>".as_bytes()).unwrap());
//! let pdf = dispatcher.convert(converter).unwrap();
//! assert!(pdf.starts_with(b"%PDF"));
//!
//! runtime.shutdown();
//! ```

mod event_loop;

pub use event_loop::{EventLoop, Runtime};

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::context::Context;
use crate::convert::Converter;
use crate::error::{Error, Result};

/// Default number of queued jobs before `submit` blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default name of the dispatcher thread started by [`Runtime`].
pub const DEFAULT_THREAD_NAME: &str = "wkhtmlpdf";

pub(crate) type Job = Box<dyn FnOnce(&mut Context) + Send>;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Maximum number of queued jobs. Zero makes every submit wait for the
    /// loop to take the job.
    pub queue_capacity: usize,

    /// Name of the thread started by [`Runtime`].
    pub thread_name: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl RuntimeOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the dispatcher thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

struct Shared {
    jobs: Sender<Job>,
    shutdown: Sender<()>,
    // Disconnects when the event loop is gone.
    stopped: Receiver<()>,
    closed: AtomicBool,
    thread: ThreadId,
}

/// Handle for submitting work to the dispatcher thread.
///
/// Cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub(crate) fn new(
        jobs: Sender<Job>,
        shutdown: Sender<()>,
        stopped: Receiver<()>,
        thread: ThreadId,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                jobs,
                shutdown,
                stopped,
                closed: AtomicBool::new(false),
                thread,
            }),
        }
    }

    /// Run `work` on the dispatcher thread and wait for its result.
    ///
    /// Blocks while the queue is full and while the job runs. Fails with
    /// [`Error::Reentrant`] when called from the dispatcher thread itself,
    /// with [`Error::DispatcherClosed`] once the dispatcher is shut down,
    /// and with [`Error::WorkPanicked`] if `work` panics.
    pub fn submit<F, R>(&self, work: F) -> Result<R>
    where
        F: FnOnce(&mut Context) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if thread::current().id() == self.shared.thread {
            return Err(Error::Reentrant);
        }
        if self.is_closed() {
            return Err(Error::DispatcherClosed);
        }

        let (reply_tx, reply_rx) = bounded(1);
        let job: Job = Box::new(move |ctx| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(ctx))).unwrap_or_else(|_| {
                log::error!("dispatched work panicked");
                Err(Error::WorkPanicked)
            });
            let _ = reply_tx.send(result);
        });

        self.shared
            .jobs
            .send(job)
            .map_err(|_| Error::DispatcherClosed)?;

        let reply = select! {
            recv(reply_rx) -> reply => reply.ok(),
            recv(self.shared.stopped) -> _ => reply_rx.try_recv().ok(),
        };
        reply.unwrap_or(Err(Error::DispatcherClosed))
    }

    /// Convert `converter` on the dispatcher thread and return the PDF bytes.
    pub fn convert(&self, converter: Converter) -> Result<Vec<u8>> {
        self.submit(move |ctx| converter.run(ctx))
    }

    /// Convert `converter` and write the PDF to `writer`.
    pub fn convert_to<W: Write>(&self, converter: Converter, writer: &mut W) -> Result<()> {
        let output = self.convert(converter)?;
        writer.write_all(&output)?;
        Ok(())
    }

    /// Stop the dispatcher.
    ///
    /// The job running now completes; queued jobs are dropped and their
    /// submitters receive [`Error::DispatcherClosed`].
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // A full or disconnected signal channel means the loop already stops.
        let _ = self.shared.shutdown.try_send(());
        log::debug!("dispatcher shutdown requested");
    }

    /// Whether [`shutdown`](Dispatcher::shutdown) was called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.jobs.len()
    }

    /// Whether the current thread is the dispatcher thread.
    pub fn is_dispatcher_thread(&self) -> bool {
        thread::current().id() == self.shared.thread
    }
}

#[cfg(feature = "async")]
impl Dispatcher {
    /// Async version of [`submit`](Dispatcher::submit).
    ///
    /// The blocking submit runs on tokio's blocking pool.
    pub async fn submit_async<F, R>(&self, work: F) -> Result<R>
    where
        F: FnOnce(&mut Context) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let dispatcher = self.clone();
        tokio::task::spawn_blocking(move || dispatcher.submit(work))
            .await
            .map_err(|_| Error::WorkPanicked)?
    }

    /// Async version of [`convert`](Dispatcher::convert).
    pub async fn convert_async(&self, converter: Converter) -> Result<Vec<u8>> {
        self.submit_async(move |ctx| converter.run(ctx)).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("thread", &self.shared.thread)
            .field("queued", &self.queued())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NullEngine;

    #[test]
    fn test_runtime_options_builder() {
        let options = RuntimeOptions::new()
            .with_queue_capacity(8)
            .with_thread_name("pdf-main");
        assert_eq!(options.queue_capacity, 8);
        assert_eq!(options.thread_name, "pdf-main");
        assert_eq!(RuntimeOptions::default().queue_capacity, 64);
    }

    #[test]
    fn test_submit_returns_value() {
        let runtime = Runtime::start(NullEngine::new).unwrap();
        let dispatcher = runtime.dispatcher();

        let answer = dispatcher.submit(|_ctx| Ok(42)).unwrap();
        assert_eq!(answer, 42);
        assert!(!dispatcher.is_dispatcher_thread());
    }

    #[test]
    fn test_error_is_propagated() {
        let runtime = Runtime::start(NullEngine::new).unwrap();
        let err = runtime
            .dispatcher()
            .submit(|_ctx| -> Result<()> { Err(Error::NoObjects) })
            .unwrap_err();
        assert!(matches!(err, Error::NoObjects));
    }

    #[test]
    fn test_convert_to_writer() {
        let runtime = Runtime::start(NullEngine::new).unwrap();
        let mut converter = Converter::new();
        converter.add(crate::Object::from_reader("<p>x</p>".as_bytes()).unwrap());

        let mut out = Vec::new();
        runtime.dispatcher().convert_to(converter, &mut out).unwrap();
        assert!(out.starts_with(b"%PDF-1.4"));
    }
}
