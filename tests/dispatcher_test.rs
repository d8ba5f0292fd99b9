//! Integration tests for the main-thread dispatcher.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use wkhtmlpdf::native::NullEngine;
use wkhtmlpdf::{Dispatcher, Error, EventLoop, Runtime, RuntimeOptions};

/// Occupy the dispatcher thread until the returned sender is used or dropped.
fn block_loop(dispatcher: &Dispatcher) -> (Sender<()>, thread::JoinHandle<wkhtmlpdf::Result<()>>) {
    let (release_tx, release_rx) = bounded::<()>(0);
    let (started_tx, started_rx) = bounded::<()>(0);

    let blocker = dispatcher.clone();
    let handle = thread::spawn(move || {
        blocker.submit(move |_ctx| {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        })
    });

    started_rx.recv().unwrap();
    (release_tx, handle)
}

fn wait_for_queue(dispatcher: &Dispatcher, len: usize) {
    while dispatcher.queued() < len {
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_fifo_across_threads() {
    let runtime = Runtime::start(NullEngine::new).unwrap();
    let dispatcher = runtime.dispatcher();
    let order = Arc::new(Mutex::new(Vec::new()));

    let (release, blocker) = block_loop(&dispatcher);

    let mut submitters = Vec::new();
    for i in 0..5 {
        let dispatcher = dispatcher.clone();
        let order = Arc::clone(&order);
        submitters.push(thread::spawn(move || {
            dispatcher.submit(move |_ctx| {
                order.lock().unwrap().push(i);
                Ok(i)
            })
        }));
        wait_for_queue(&runtime.dispatcher(), i + 1);
    }

    release.send(()).unwrap();
    blocker.join().unwrap().unwrap();
    for (i, submitter) in submitters.into_iter().enumerate() {
        assert_eq!(submitter.join().unwrap().unwrap(), i);
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_runs_on_named_thread() {
    let runtime =
        Runtime::start_with(NullEngine::new, RuntimeOptions::new().with_thread_name("pdf-main"))
            .unwrap();

    let name = runtime
        .dispatcher()
        .submit(|_ctx| Ok(thread::current().name().map(str::to_string)))
        .unwrap();
    assert_eq!(name.as_deref(), Some("pdf-main"));
}

#[test]
fn test_reentrant_submit_is_rejected() {
    let runtime = Runtime::start(NullEngine::new).unwrap();
    let dispatcher = runtime.dispatcher();

    let inner = dispatcher.clone();
    let rejected = dispatcher
        .submit(move |_ctx| {
            assert!(inner.is_dispatcher_thread());
            Ok(matches!(inner.submit(|_ctx| Ok(())), Err(Error::Reentrant)))
        })
        .unwrap();
    assert!(rejected);
}

#[test]
fn test_panicking_work_is_reported() {
    let runtime = Runtime::start(NullEngine::new).unwrap();
    let dispatcher = runtime.dispatcher();

    let err = dispatcher
        .submit(|_ctx| -> wkhtmlpdf::Result<()> { panic!("boom") })
        .unwrap_err();
    assert!(matches!(err, Error::WorkPanicked));

    assert_eq!(dispatcher.submit(|_ctx| Ok("still serving")).unwrap(), "still serving");
}

#[test]
fn test_shutdown_rejects_queued_and_new_work() {
    let engine = NullEngine::new();
    let journal = engine.journal();
    let runtime = Runtime::start(move || engine).unwrap();
    let dispatcher = runtime.dispatcher();

    let (release, blocker) = block_loop(&dispatcher);

    let queued = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || dispatcher.submit(|_ctx| Ok(())))
    };
    wait_for_queue(&dispatcher, 1);

    dispatcher.shutdown();
    release.send(()).unwrap();

    assert!(blocker.join().unwrap().is_ok());
    assert!(matches!(queued.join().unwrap(), Err(Error::DispatcherClosed)));
    assert!(matches!(
        dispatcher.submit(|_ctx| Ok(())),
        Err(Error::DispatcherClosed)
    ));

    runtime.shutdown();
    assert_eq!(journal.deinit_calls(), 1);
    assert!(!journal.is_initialized());
}

#[test]
fn test_drop_shuts_down() {
    let engine = NullEngine::new();
    let journal = engine.journal();
    let dispatcher = {
        let runtime = Runtime::start(move || engine).unwrap();
        runtime.dispatcher()
    };

    assert!(dispatcher.is_closed());
    assert_eq!(journal.deinit_calls(), 1);
    assert!(matches!(
        dispatcher.submit(|_ctx| Ok(())),
        Err(Error::DispatcherClosed)
    ));
}

#[test]
fn test_init_failure_is_reported_synchronously() {
    let err = Runtime::start(|| NullEngine::builder().fail_init().build()).unwrap_err();
    assert!(matches!(err, Error::Init(_)));
}

#[test]
fn test_event_loop_on_current_thread() {
    let event_loop = EventLoop::initialize(NullEngine::new()).unwrap();
    let dispatcher = event_loop.dispatcher();

    let worker = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || {
            let results: Vec<_> = (0..3)
                .map(|i| dispatcher.submit(move |ctx| Ok((i, ctx.is_initialized()))))
                .collect();
            dispatcher.shutdown();
            results
        })
    };

    event_loop.run();

    let results = worker.join().unwrap();
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), (i, true));
    }
    assert!(matches!(
        dispatcher.submit(|_ctx| Ok(())),
        Err(Error::DispatcherClosed)
    ));
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_submit_async() {
    let runtime = Runtime::start(NullEngine::new).unwrap();
    let version = runtime
        .dispatcher()
        .submit_async(|ctx| ctx.version())
        .await
        .unwrap();
    assert!(version.contains("null"));
}
