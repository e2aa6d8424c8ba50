//! The deferred write coordinator.
//!
//! Producers register a write-back action once and later call
//! [`DeferredWriter::flag`] instead of writing themselves. A single worker
//! thread sleeps on a capacity-1 wake channel; flags raised while it is asleep
//! or busy collapse into one wake-up, and each wake-up scans every
//! registration in index order and runs the pending ones.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{ConfigError, WritebackError, WritebackResult};

use super::observer::{panic_message, ActionFailure, FailureKind, FailureObserver, LogObserver};
use super::registry::AppendOnly;
use super::WriterHandle;

/// Error type actions report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a registered action returns.
pub type ActionResult = Result<(), BoxError>;

type Action = Box<dyn Fn() -> ActionResult + Send + Sync>;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Worker stack size in bytes; the platform default when `None`.
    pub stack_size: Option<usize>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            thread_name: "writeback".to_string(),
            stack_size: None,
        }
    }
}

impl WriterConfig {
    const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Checks the configuration, returning it unchanged when valid.
    ///
    /// # Errors
    /// Rejects an empty thread name, one containing NUL, or a stack smaller
    /// than 16 KiB.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.thread_name.is_empty() || self.thread_name.contains('\0') {
            return Err(ConfigError::InvalidField {
                field: "thread_name",
                reason: "must be non-empty and must not contain NUL".to_string(),
            });
        }

        if let Some(size) = self.stack_size {
            if size < Self::MIN_STACK_SIZE {
                return Err(ConfigError::InvalidField {
                    field: "stack_size",
                    reason: format!(
                        "must be at least {} bytes (got {size})",
                        Self::MIN_STACK_SIZE
                    ),
                });
            }
        }

        Ok(self)
    }
}

/// Observable state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    /// Nothing to write.
    Idle,
    /// Flagged; runs on the next scan.
    Pending,
    /// The worker is executing the action.
    Running,
}

const IDLE: u8 = 0;
const PENDING: u8 = 1;
const RUNNING: u8 = 2;
// Running, and flagged again since the run started.
const RERUN: u8 = 3;

struct Registration {
    name: Option<String>,
    state: AtomicU8,
    action: Action,
}

impl Registration {
    /// Marks the registration pending. Returns false if the flag coalesced
    /// into one that was already outstanding.
    fn mark(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| match s {
                IDLE => Some(PENDING),
                RUNNING => Some(RERUN),
                _ => None,
            })
            .is_ok()
    }

    fn begin(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish(&self) {
        if self
            .state
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Only RERUN can be observed here; `flag` never leaves RERUN.
            self.state.store(PENDING, Ordering::Release);
        }
    }

    fn observe(&self) -> ActionState {
        match self.state.load(Ordering::Acquire) {
            IDLE => ActionState::Idle,
            PENDING => ActionState::Pending,
            _ => ActionState::Running,
        }
    }

    fn display_name(&self, handle: WriterHandle) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("action-{}", handle.index()))
    }
}

#[derive(Debug, Default)]
struct Counters {
    flags: AtomicU64,
    coalesced: AtomicU64,
    wakeups: AtomicU64,
    runs: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of the writer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Flags accepted for a valid handle.
    pub flags: u64,
    /// Flags that found their registration already pending.
    pub coalesced: u64,
    /// Times the worker woke up to scan.
    pub wakeups: u64,
    /// Actions executed.
    pub runs: u64,
    /// Actions that returned an error or panicked.
    pub failures: u64,
}

struct Shared {
    registry: AppendOnly<Registration>,
    counters: Counters,
    observer: Box<dyn FailureObserver>,
}

/// Coordinates deferred, coalesced execution of registered write-back actions.
///
/// Construct one per process component that owns persisted state and share
/// it (typically as `Arc<DeferredWriter>`) with the producers that flag.
/// Dropping the writer stops the worker after it has run every action that
/// was flagged before the drop; producers must stop flagging first.
pub struct DeferredWriter {
    shared: Arc<Shared>,
    wake_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl DeferredWriter {
    /// Starts a writer that reports action failures through the `log` facade.
    ///
    /// # Errors
    /// Fails if the configuration is invalid or the worker thread cannot be spawned.
    pub fn new(config: WriterConfig) -> WritebackResult<Self> {
        Self::with_observer(config, LogObserver)
    }

    /// Starts a writer that reports action failures to `observer`.
    ///
    /// # Errors
    /// Fails if the configuration is invalid or the worker thread cannot be spawned.
    pub fn with_observer<O>(config: WriterConfig, observer: O) -> WritebackResult<Self>
    where
        O: FailureObserver + 'static,
    {
        let config = config.validate()?;
        let (wake_tx, wake_rx) = bounded::<()>(1);

        let shared = Arc::new(Shared {
            registry: AppendOnly::new(),
            counters: Counters::default(),
            observer: Box::new(observer),
        });

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }
        let worker_shared = Arc::clone(&shared);
        let worker = builder
            .spawn(move || worker_loop(&worker_shared, &wake_rx))
            .map_err(WritebackError::Spawn)?;

        log::debug!("write-back worker '{}' started", config.thread_name);

        Ok(Self {
            shared,
            wake_tx,
            worker: Some(worker),
        })
    }

    /// Registers an action and returns its handle. Handles are dense and
    /// increase from 0 in registration order.
    pub fn register<F>(&self, action: F) -> WriterHandle
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        self.insert(None, Box::new(action))
    }

    /// Registers an action under `name`, used when reporting its failures.
    pub fn register_named<F>(&self, name: impl Into<String>, action: F) -> WriterHandle
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        self.insert(Some(name.into()), Box::new(action))
    }

    fn insert(&self, name: Option<String>, action: Action) -> WriterHandle {
        let index = self.shared.registry.push(Registration {
            name,
            state: AtomicU8::new(IDLE),
            action,
        });
        let handle = WriterHandle::new(index);
        log::debug!("registered write-back action {handle}");
        handle
    }

    /// Requests that the action behind `handle` runs soon.
    ///
    /// Never blocks and never allocates. A handle this writer did not issue
    /// is ignored.
    pub fn flag(&self, handle: WriterHandle) {
        let Some(entry) = self.shared.registry.get(handle.index()) else {
            return;
        };

        let counters = &self.shared.counters;
        counters.flags.fetch_add(1, Ordering::Relaxed);
        if !entry.mark() {
            counters.coalesced.fetch_add(1, Ordering::Relaxed);
        }

        // The state is published before the signal; a full slot means a
        // wake-up is already outstanding and its scan will see this flag.
        let _ = self.wake_tx.try_send(());
    }

    /// Current state of a registration, `None` for an unknown handle.
    #[must_use]
    pub fn state(&self, handle: WriterHandle) -> Option<ActionState> {
        self.shared.registry.get(handle.index()).map(Registration::observe)
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.registry.len()
    }

    /// Returns true if nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the flag, wake-up, run and failure counters.
    #[must_use]
    pub fn stats(&self) -> WriterStats {
        let c = &self.shared.counters;
        WriterStats {
            flags: c.flags.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            wakeups: c.wakeups.load(Ordering::Relaxed),
            runs: c.runs.load(Ordering::Acquire),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for DeferredWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredWriter")
            .field("registrations", &self.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Drop for DeferredWriter {
    fn drop(&mut self) {
        // Close the channel so the worker drains the last wake-up and exits.
        let (closed, _) = bounded::<()>(1);
        drop(std::mem::replace(&mut self.wake_tx, closed));

        let Some(handle) = self.worker.take() else {
            return;
        };

        // Dropped by one of our own actions: joining would deadlock, and the
        // worker exits by itself once the current scan completes.
        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            log::error!("write-back worker terminated abnormally");
        } else {
            log::info!("write-back worker stopped");
        }
    }
}

fn worker_loop(shared: &Shared, wake_rx: &Receiver<()>) {
    while wake_rx.recv().is_ok() {
        shared.counters.wakeups.fetch_add(1, Ordering::Relaxed);
        scan(shared);
    }
}

fn scan(shared: &Shared) {
    let mut ran = 0usize;
    for (index, entry) in shared.registry.iter() {
        if !entry.begin() {
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.action)()));
        entry.finish();
        ran += 1;

        let kind = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(FailureKind::Error(err.to_string())),
            Err(payload) => Some(FailureKind::from_panic(payload.as_ref())),
        };

        if let Some(kind) = kind {
            shared.counters.failures.fetch_add(1, Ordering::Relaxed);
            let handle = WriterHandle::new(index);
            let failure = ActionFailure {
                handle,
                name: entry.display_name(handle),
                kind,
                failed_at: Utc::now(),
            };
            // The observer is user code too; it must not take the worker down.
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| shared.observer.on_failure(&failure)))
            {
                log::error!(
                    "failure observer panicked while reporting {failure}: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        // Counted last: once `runs` covers an action, its failure report is done.
        shared.counters.runs.fetch_add(1, Ordering::Release);
    }
    log::debug!("write-back scan ran {ran} action(s)");
}
