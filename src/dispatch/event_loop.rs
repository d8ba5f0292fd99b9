//! Dispatcher loop and its thread.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};

use super::{Dispatcher, Job, RuntimeOptions};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::native::NativeEngine;

/// Loop that runs dispatched jobs on the thread that created it.
///
/// Use this when the engine must live on a thread you already own, such as
/// the process main thread:
///
/// ```
/// use std::thread;
/// use wkhtmlpdf::native::NullEngine;
/// use wkhtmlpdf::EventLoop;
///
/// let event_loop = EventLoop::initialize(NullEngine::new()).unwrap();
/// let dispatcher = event_loop.dispatcher();
///
/// let worker = thread::spawn(move || {
///     let version = dispatcher.submit(|ctx| ctx.version());
///     dispatcher.shutdown();
///     version
/// });
///
/// event_loop.run();
/// assert!(worker.join().unwrap().is_ok());
/// ```
pub struct EventLoop {
    context: Context,
    jobs: Receiver<Job>,
    shutdown: Receiver<()>,
    _stopped: Sender<()>,
    dispatcher: Dispatcher,
}

impl EventLoop {
    /// Initialize `engine` on the current thread with default options.
    pub fn initialize<E: NativeEngine + 'static>(engine: E) -> Result<Self> {
        Self::initialize_with(engine, &RuntimeOptions::default())
    }

    /// Initialize `engine` on the current thread.
    pub fn initialize_with<E: NativeEngine + 'static>(
        engine: E,
        options: &RuntimeOptions,
    ) -> Result<Self> {
        let context = Context::initialize(engine)?;
        let (jobs_tx, jobs) = bounded(options.queue_capacity);
        let (shutdown_tx, shutdown) = bounded(1);
        let (stopped, stopped_rx) = bounded(0);

        let dispatcher = Dispatcher::new(jobs_tx, shutdown_tx, stopped_rx, thread::current().id());
        Ok(Self {
            context,
            jobs,
            shutdown,
            _stopped: stopped,
            dispatcher,
        })
    }

    /// Handle for submitting work to this loop.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Direct access to the context on the loop thread.
    pub fn context(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Run jobs until the dispatcher is shut down, then release the engine.
    pub fn run(mut self) {
        log::debug!(
            "event loop running on {}",
            thread::current().name().unwrap_or("unnamed thread")
        );

        loop {
            select! {
                recv(self.jobs) -> job => match job {
                    Ok(job) if !self.dispatcher.is_closed() => job(&mut self.context),
                    _ => break,
                },
                recv(self.shutdown) -> _ => break,
            }
        }

        let dropped = self.jobs.try_iter().count();
        if dropped > 0 {
            log::warn!("dropped {} queued job(s) at shutdown", dropped);
        }
        self.context.shutdown();
        log::debug!("event loop stopped");
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("context", &self.context)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Dedicated dispatcher thread.
///
/// The engine is built on the new thread by a factory closure, so it never
/// crosses threads. Dropping the runtime shuts it down and joins the thread.
#[derive(Debug)]
pub struct Runtime {
    dispatcher: Dispatcher,
    thread: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Start a dispatcher thread with default options.
    pub fn start<F, E>(factory: F) -> Result<Self>
    where
        F: FnOnce() -> E + Send + 'static,
        E: NativeEngine + 'static,
    {
        Self::start_with(factory, RuntimeOptions::default())
    }

    /// Start a dispatcher thread.
    ///
    /// Returns once the engine is initialized, or with its initialization
    /// error.
    pub fn start_with<F, E>(factory: F, options: RuntimeOptions) -> Result<Self>
    where
        F: FnOnce() -> E + Send + 'static,
        E: NativeEngine + 'static,
    {
        let (ready_tx, ready_rx) = bounded::<Result<Dispatcher>>(1);

        let thread = thread::Builder::new()
            .name(options.thread_name.clone())
            .spawn(move || match EventLoop::initialize_with(factory(), &options) {
                Ok(event_loop) => {
                    if ready_tx.send(Ok(event_loop.dispatcher())).is_ok() {
                        event_loop.run();
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(dispatcher)) => Ok(Self {
                dispatcher,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::Init(
                    "dispatcher thread exited during startup".to_string(),
                ))
            }
        }
    }

    /// Handle for submitting work.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Shut down and join the dispatcher thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.dispatcher.shutdown();
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            log::warn!("runtime dropped on its own thread, not joining");
            return;
        }
        if thread.join().is_err() {
            log::error!("dispatcher thread panicked");
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}
