//! Thread-owning engine for the script runtime
//!
//! The script heap may only be touched from the thread that created it. The
//! [`Engine`] owns that thread; jobs are submitted through a thread-safe
//! [`EngineHandle`] and run one at a time with the bridge in scope. The
//! engine collects at the safepoint between two jobs. A job that panics is
//! answered with [`RuntimeError::JobPanicked`] and the loop carries on.
//!
//! # Example
//!
//! ```no_run
//! use ferry_core::Value;
//! use ferry_runtime::Engine;
//!
//! let engine = Engine::new().unwrap();
//! let handle = engine.handle();
//!
//! let value = handle
//!     .run(|bridge| bridge.to_native(&ferry_script::ScriptValue::Number(2.0)))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(value, Value::int(2));
//!
//! engine.shutdown();
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use ferry_core::{BridgeResult, ObjectRef, Value};
use ferry_script::ScriptContext;
use ferry_script_bridge::ScriptBridge;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::marshal::{MarshaledObject, marshal, unmarshal};

/// Work shipped to the engine thread; returns false when the work panicked
pub type Job = Box<dyn FnOnce(&ScriptBridge) -> bool + Send + 'static>;

/// Setup run on the engine thread before the first job
pub type InitFn = Arc<dyn Fn(&ScriptBridge) -> BridgeResult<()> + Send + Sync>;

enum Message {
    Run(Job),
    Shutdown,
}

thread_local! {
    static CURRENT: RefCell<Option<ScriptBridge>> = const { RefCell::new(None) };
}

/// The bridge owned by the current thread, if it is an engine thread
fn current_bridge() -> Option<ScriptBridge> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Statistics about engine operation
///
/// All counters are atomic and can be read at any time without locking.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Jobs queued for the engine thread
    pub jobs_submitted: AtomicU64,
    /// Jobs the engine thread has finished
    pub jobs_completed: AtomicU64,
    /// Finished jobs that panicked
    pub jobs_panicked: AtomicU64,
    /// Calls made directly because the caller already was the engine thread
    pub direct_calls: AtomicU64,
    /// Collections run at job boundaries
    pub collections: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_panicked: self.jobs_panicked.load(Ordering::Relaxed),
            direct_calls: self.direct_calls.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
        }
    }

    /// Jobs queued but not yet finished
    pub fn jobs_in_flight(&self) -> u64 {
        let submitted = self.jobs_submitted.load(Ordering::Relaxed);
        let completed = self.jobs_completed.load(Ordering::Relaxed);
        submitted.saturating_sub(completed)
    }
}

/// A point-in-time snapshot of engine statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_panicked: u64,
    pub direct_calls: u64,
    pub collections: u64,
}

/// Builder for an [`Engine`] with custom configuration
#[derive(Default)]
pub struct EngineBuilder {
    config: RuntimeConfig,
    inits: Vec<InitFn>,
}

impl EngineBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.thread_name(name);
        self
    }

    /// Job queue capacity. When the queue is full, `try_run` fails.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.queue_capacity(capacity);
        self
    }

    pub fn gc_threshold(mut self, threshold: usize) -> Self {
        self.config = self.config.gc_threshold(threshold);
        self
    }

    /// Run `init` on the engine thread before any job, e.g. to expose
    /// native objects as globals
    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&ScriptBridge) -> BridgeResult<()> + Send + Sync + 'static,
    {
        self.inits.push(Arc::new(init));
        self
    }

    /// Start the engine thread and wait until its setup has finished
    pub fn build(self) -> RuntimeResult<Engine> {
        Engine::start(self)
    }
}

/// Owner of the engine thread
///
/// Dropping the engine stops the thread after the queued jobs have run.
pub struct Engine {
    handle: EngineHandle,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn with_config(config: RuntimeConfig) -> RuntimeResult<Self> {
        Self::builder().config(config).build()
    }

    fn start(builder: EngineBuilder) -> RuntimeResult<Self> {
        let EngineBuilder { config, inits } = builder;
        let capacity = config.queue_capacity;
        let (job_tx, job_rx) = bounded::<Message>(capacity);
        let (ready_tx, ready_rx) = bounded::<BridgeResult<()>>(1);
        let stats = Arc::new(EngineStats::new());
        let thread = Arc::new(OnceLock::new());

        let worker_stats = stats.clone();
        let worker_thread = thread.clone();
        let heap = config.heap_config();
        let worker = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let _ = worker_thread.set(std::thread::current().id());
                let bridge = ScriptBridge::install(ScriptContext::with_config(heap));
                run_engine(bridge, inits, job_rx, ready_tx, &worker_stats);
            })
            .map_err(|e| RuntimeError::Spawn(e.to_string()))?;

        let handle = EngineHandle {
            job_tx,
            stats,
            thread,
            capacity,
        };
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = worker.join();
                return Err(RuntimeError::ShutDown);
            }
        }
        debug!(thread = %config.thread_name, capacity, "engine started");

        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    /// A thread-safe handle for submitting jobs
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.handle.stats
    }

    /// Run the queued jobs, then stop the engine thread and wait for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.handle.job_tx.send(Message::Shutdown);
        if self.handle.is_engine_thread() {
            // Joining ourselves would never return; the loop ends on its own.
            return;
        }
        if worker.join().is_err() {
            warn!("engine thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_engine(
    bridge: ScriptBridge,
    inits: Vec<InitFn>,
    jobs: Receiver<Message>,
    ready: Sender<BridgeResult<()>>,
    stats: &EngineStats,
) {
    CURRENT.with(|current| *current.borrow_mut() = Some(bridge.clone()));
    for init in &inits {
        if let Err(e) = init(&bridge) {
            warn!(error = %e, "engine setup failed");
            CURRENT.with(|current| current.borrow_mut().take());
            let _ = ready.send(Err(e));
            return;
        }
    }
    let _ = ready.send(Ok(()));

    for message in jobs.iter() {
        match message {
            Message::Run(job) => {
                if !job(&bridge) {
                    stats.jobs_panicked.fetch_add(1, Ordering::Relaxed);
                }
                stats.jobs_completed.fetch_add(1, Ordering::Relaxed);
                match bridge.collect_if_needed() {
                    Ok(true) => {
                        stats.collections.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "collection at job boundary failed"),
                }
            }
            Message::Shutdown => break,
        }
    }

    CURRENT.with(|current| current.borrow_mut().take());
    debug!("engine stopped");
}

/// Run `f`, turning a panic into `JobPanicked`
fn run_with_panic_handler<F, R>(f: F) -> RuntimeResult<R>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| {
        let message = panic_message(panic.as_ref());
        error!(panic = %message, "job panicked on the engine thread");
        RuntimeError::JobPanicked(message)
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

/// Thread-safe handle for submitting jobs to an [`Engine`]
///
/// Every submission made from the engine thread itself runs immediately, so
/// marshaled objects may be used re-entrantly.
#[derive(Clone)]
pub struct EngineHandle {
    job_tx: Sender<Message>,
    stats: Arc<EngineStats>,
    thread: Arc<OnceLock<ThreadId>>,
    capacity: usize,
}

impl EngineHandle {
    /// True when called on this engine's thread
    pub fn is_engine_thread(&self) -> bool {
        self.thread
            .get()
            .is_some_and(|id| *id == std::thread::current().id())
    }

    fn direct<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&ScriptBridge) -> R,
    {
        if !self.is_engine_thread() {
            return None;
        }
        let bridge = current_bridge()?;
        self.stats.direct_calls.fetch_add(1, Ordering::Relaxed);
        Some(f(&bridge))
    }

    fn job<F, R>(f: F, respond: impl FnOnce(RuntimeResult<R>) + Send + 'static) -> Message
    where
        F: FnOnce(&ScriptBridge) -> R + Send + 'static,
        R: Send + 'static,
    {
        Message::Run(Box::new(move |bridge| {
            let result = run_with_panic_handler(|| f(bridge));
            let completed = result.is_ok();
            respond(result);
            completed
        }))
    }

    /// Run `f` on the engine thread and wait for its result
    pub fn run<F, R>(&self, f: F) -> RuntimeResult<R>
    where
        F: FnOnce(&ScriptBridge) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_engine_thread() {
            return self.direct(f).ok_or(RuntimeError::ShutDown);
        }
        let (tx, rx) = bounded(1);
        self.job_tx
            .send(Self::job(f, move |result| {
                let _ = tx.send(result);
            }))
            .map_err(|_| RuntimeError::ShutDown)?;
        self.stats.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        trace!("job submitted");
        rx.recv().map_err(|_| RuntimeError::DroppedResponse)?
    }

    /// Queue `f` without blocking; fails with `QueueFull` under backpressure
    ///
    /// The returned receiver can be awaited or read with `blocking_recv`. It
    /// yields `JobPanicked` when `f` panics.
    pub fn try_run<F, R>(&self, f: F) -> RuntimeResult<oneshot::Receiver<RuntimeResult<R>>>
    where
        F: FnOnce(&ScriptBridge) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let message = Self::job(f, move |result| {
            let _ = tx.send(result);
        });
        self.job_tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => RuntimeError::QueueFull(self.capacity),
            TrySendError::Disconnected(_) => RuntimeError::ShutDown,
        })?;
        self.stats.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(rx)
    }

    /// Run `f` on the engine thread without blocking the async caller
    pub async fn run_async<F, R>(&self, f: F) -> RuntimeResult<R>
    where
        F: FnOnce(&ScriptBridge) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_engine_thread() {
            return self.direct(f).ok_or(RuntimeError::ShutDown);
        }
        let (tx, rx) = oneshot::channel();
        self.job_tx
            .send(Self::job(f, move |result| {
                let _ = tx.send(result);
            }))
            .map_err(|_| RuntimeError::ShutDown)?;
        self.stats.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        rx.await.map_err(|_| RuntimeError::DroppedResponse)?
    }

    /// Bind a native object to a global name in the script runtime
    pub fn expose_object(&self, name: &str, object: ObjectRef) -> RuntimeResult<()> {
        let name = name.to_string();
        let value = unmarshal(Value::Object(object), self);
        self.run(move |bridge| bridge.expose(&name, &value))?
            .map_err(RuntimeError::from)
    }

    /// The script global object, usable from any thread
    pub fn global(&self) -> RuntimeResult<MarshaledObject> {
        let handle = self.clone();
        let global = self.run(|bridge| bridge.global())??;
        Ok(MarshaledObject::new(Arc::new(global), handle))
    }

    /// Evaluate `f` on the engine thread and marshal the value it produces
    pub fn eval<F>(&self, f: F) -> RuntimeResult<Value>
    where
        F: FnOnce(&ScriptBridge) -> BridgeResult<Value> + Send + 'static,
    {
        let value = self.run(f)??;
        Ok(marshal(value, self))
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.job_tx.len()
    }

    /// Two handles submit to the same engine
    pub fn same_engine(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.thread, &other.thread)
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("thread", &self.thread.get())
            .field("capacity", &self.capacity)
            .finish()
    }
}
