// Dispatcher - owns the engine context and the worker thread that drives it
//
// The foreground thread enqueues commands and drains responses; the worker
// thread executes commands one at a time against the engine. Both queues are
// mutex-protected. The request queue has a condition variable the worker
// sleeps on; the response queue has a wake callback that tells the
// foreground thread to drain.
//
// The worker thread lives from the first start until shutdown. Stopping and
// starting only flip a flag under the request mutex, so neither ever waits
// for an engine call.

use super::command::Command;
use super::response::Response;
use crate::engine::{Engine, EngineError, EngineHandle, Status};
use crate::metrics::DispatcherMetrics;
use crate::models::DispatcherSettings;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;

/// Callback the worker invokes after every posted response.
///
/// Must be cheap and non-blocking; it only schedules a drain on the
/// foreground thread.
pub type WakeFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Engine initialisation failed: {0}")]
    EngineInit(#[from] EngineError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Worker thread panicked, engine context lost")]
    WorkerPanicked,

    #[error("Engine context is not available")]
    EngineUnavailable,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Caller-chosen number stamped on every response a command posts.
///
/// `0` means the command was queued without one.
pub type Ticket = u64;

struct Queued {
    ticket: Ticket,
    command: Box<dyn Command>,
}

struct RequestQueue {
    commands: VecDeque<Queued>,
    /// The worker may start new commands
    running: bool,
    /// Commands at the front of the queue that were pending when the
    /// dispatcher was stopped; the worker drops them unexecuted
    abandon: usize,
    /// The worker thread must return its engine slot and exit
    exit: bool,
}

impl RequestQueue {
    fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.abandon = self.commands.len();
            tracing::debug!(
                "Stopping engine worker, {} queued commands to discard",
                self.abandon
            );
        }
    }
}

/// Outbound side: finished responses plus the wake signal.
pub(crate) struct ResponseQueue {
    responses: Mutex<Vec<Response>>,
    wake: WakeFn,
    metrics: Arc<DispatcherMetrics>,
}

impl ResponseQueue {
    pub(crate) fn new(wake: WakeFn, metrics: Arc<DispatcherMetrics>) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            wake,
            metrics,
        }
    }

    fn push(&self, response: Response) {
        lock(&self.responses).push(response);
        self.metrics.record_posted();
        (self.wake)();
    }

    pub(crate) fn drain(&self) -> Vec<Response> {
        std::mem::take(&mut *lock(&self.responses))
    }
}

struct Shared {
    requests: Mutex<RequestQueue>,
    available: Condvar,
    responses: ResponseQueue,
    metrics: Arc<DispatcherMetrics>,
}

struct EngineSlot {
    engine: Box<dyn Engine>,
    handle: EngineHandle,
}

/// What a command sees while it executes on the worker thread.
pub struct WorkerContext<'a> {
    engine: &'a mut dyn Engine,
    handle: &'a EngineHandle,
    responses: &'a ResponseQueue,
    ticket: Ticket,
}

impl<'a> WorkerContext<'a> {
    pub(crate) fn new(
        engine: &'a mut dyn Engine,
        handle: &'a EngineHandle,
        responses: &'a ResponseQueue,
        ticket: Ticket,
    ) -> Self {
        Self {
            engine,
            handle,
            responses,
            ticket,
        }
    }

    /// Ticket the running command was queued with.
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Make one engine call with `response` as its result sink.
    pub fn invoke<F>(&mut self, response: &mut Response, call: F) -> Status
    where
        F: FnOnce(&mut dyn Engine, &EngineHandle, &mut Response) -> Status,
    {
        call(&mut *self.engine, self.handle, response)
    }

    /// Hand a finished response to the foreground thread.
    pub fn post(&self, mut response: Response) {
        response.set_ticket(self.ticket);
        self.responses.push(response);
    }
}

/// Asynchronous command/response bridge in front of a non-reentrant engine.
///
/// The engine context is created in [`Dispatcher::new`] and released when the
/// dispatcher is dropped. The worker thread is spawned by the first
/// [`Dispatcher::set_running`]`(true)` and lives until [`Dispatcher::shutdown`];
/// while no worker thread exists the engine is parked inside the dispatcher.
/// While the dispatcher is stopped, commands accumulate in the queue.
pub struct Dispatcher {
    shared: Arc<Shared>,
    parked: Mutex<Option<EngineSlot>>,
    worker: Mutex<Option<JoinHandle<EngineSlot>>>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    /// Create the engine context and an idle dispatcher around it.
    ///
    /// `wake` is called from the worker thread each time a response is posted.
    pub fn new(
        mut engine: Box<dyn Engine>,
        settings: DispatcherSettings,
        wake: WakeFn,
    ) -> Result<Self, DispatchError> {
        let handle = engine.create_context()?;
        tracing::info!("Engine context {} created", handle.id());

        let metrics = Arc::new(DispatcherMetrics::new());
        let shared = Arc::new(Shared {
            requests: Mutex::new(RequestQueue {
                commands: VecDeque::new(),
                running: false,
                abandon: 0,
                exit: false,
            }),
            available: Condvar::new(),
            responses: ResponseQueue::new(wake, Arc::clone(&metrics)),
            metrics,
        });

        Ok(Self {
            shared,
            parked: Mutex::new(Some(EngineSlot { engine, handle })),
            worker: Mutex::new(None),
            settings,
        })
    }

    /// Append a command to the request queue and wake the worker.
    ///
    /// Never blocks on command execution. Commands queued while the worker
    /// is stopped run once it is started.
    pub fn enqueue(&self, command: Box<dyn Command>) {
        self.enqueue_with_ticket(0, command);
    }

    /// Like [`Dispatcher::enqueue`], stamping `ticket` on every response the
    /// command posts.
    pub fn enqueue_with_ticket(&self, ticket: Ticket, command: Box<dyn Command>) {
        let name = command.name();
        {
            let mut queue = lock(&self.shared.requests);
            queue.commands.push_back(Queued { ticket, command });
            tracing::trace!("Enqueued {} ({} pending)", name, queue.commands.len());
        }
        self.shared.metrics.record_enqueued();
        self.shared.available.notify_one();
    }

    /// Take every response posted so far, in posting order.
    pub fn drain_responses(&self) -> Vec<Response> {
        let responses = self.shared.responses.drain();
        if !responses.is_empty() {
            self.shared.metrics.record_drained(responses.len());
            if responses.len() > self.settings.response_batch_warn {
                tracing::warn!(
                    "Drained {} responses in one batch, foreground is falling behind",
                    responses.len()
                );
            }
        }
        responses
    }

    /// Start or stop executing commands.
    ///
    /// Neither direction waits for the engine. Starting an already running
    /// dispatcher does nothing; the first start spawns the worker thread.
    /// Stopping lets the in-flight command finish, then the worker discards
    /// every command that was queued at the time of the stop. Commands queued
    /// afterwards wait for the next start.
    pub fn set_running(&self, running: bool) -> Result<(), DispatchError> {
        if !running {
            lock(&self.shared.requests).stop();
            self.shared.available.notify_all();
            return Ok(());
        }

        let mut worker = lock(&self.worker);
        if worker.is_some() {
            let mut queue = lock(&self.shared.requests);
            if queue.running {
                tracing::debug!("Engine worker already running");
            } else {
                queue.running = true;
                tracing::info!("Engine worker resumed");
            }
            drop(queue);
            self.shared.available.notify_all();
            return Ok(());
        }

        let slot = lock(&self.parked)
            .take()
            .ok_or(DispatchError::EngineUnavailable)?;
        {
            let mut queue = lock(&self.shared.requests);
            queue.running = true;
            queue.exit = false;
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.settings.worker_thread_name.clone())
            .spawn(move || worker_loop(shared, slot))
            .map_err(DispatchError::Spawn)?;
        *worker = Some(handle);

        tracing::info!("Engine worker started");
        Ok(())
    }

    /// Whether a worker thread exists and has not been told to stop.
    pub fn is_running(&self) -> bool {
        let worker = lock(&self.worker);
        worker.is_some() && lock(&self.shared.requests).running
    }

    /// Number of commands waiting to be executed.
    pub fn pending_commands(&self) -> usize {
        lock(&self.shared.requests).commands.len()
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.shared.metrics
    }

    /// Stop the worker and wait for its thread to exit.
    ///
    /// The only call that blocks on the engine, for at most the duration of
    /// the in-flight command. The engine context stays alive; the dispatcher
    /// can be started again.
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        let previous = {
            let mut worker = lock(&self.worker);
            {
                let mut queue = lock(&self.shared.requests);
                queue.stop();
                queue.exit = true;
            }
            self.shared.available.notify_all();
            worker.take()
        };
        match previous {
            Some(handle) => self.reclaim(handle),
            None => Ok(()),
        }
    }

    fn reclaim(&self, handle: JoinHandle<EngineSlot>) -> Result<(), DispatchError> {
        let slot = handle.join().map_err(|_| DispatchError::WorkerPanicked)?;
        *lock(&self.parked) = Some(slot);
        Ok(())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Engine worker did not shut down cleanly: {}", e);
        }

        let remaining = std::mem::take(&mut lock(&self.shared.requests).commands);
        if !remaining.is_empty() {
            tracing::debug!("Dropping {} never-started commands", remaining.len());
            self.shared.metrics.record_abandoned(remaining.len());
        }
        drop(remaining);

        let slot = self
            .parked
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(EngineSlot { mut engine, handle }) = slot {
            let id = handle.id();
            match engine.destroy_context(handle) {
                Ok(()) => tracing::info!("Engine context {} released", id),
                Err(e) => tracing::error!("{}", e),
            }
        }

        self.shared.metrics.log_summary();
    }
}

fn worker_loop(shared: Arc<Shared>, mut slot: EngineSlot) -> EngineSlot {
    tracing::debug!("Worker loop entered");

    let mut queue = lock(&shared.requests);
    loop {
        while queue.abandon == 0
            && !queue.exit
            && !(queue.running && !queue.commands.is_empty())
        {
            queue = shared
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if queue.abandon > 0 {
            let count = queue.abandon.min(queue.commands.len());
            queue.abandon = 0;
            let abandoned: Vec<Queued> = queue.commands.drain(..count).collect();
            drop(queue);
            if !abandoned.is_empty() {
                tracing::warn!(
                    "Worker stopped with {} queued commands, discarding them",
                    abandoned.len()
                );
                shared.metrics.record_abandoned(abandoned.len());
            }
            drop(abandoned);
            queue = lock(&shared.requests);
            continue;
        }
        if queue.exit {
            break;
        }
        let Some(Queued {
            ticket,
            mut command,
        }) = queue.commands.pop_front()
        else {
            continue;
        };
        drop(queue);

        let name = command.name();
        let started = Instant::now();
        let success = {
            let mut ctx = WorkerContext::new(
                slot.engine.as_mut(),
                &slot.handle,
                &shared.responses,
                ticket,
            );
            command.execute(&mut ctx)
        };
        let elapsed = started.elapsed();
        shared.metrics.record_executed(success, elapsed);
        if success {
            tracing::debug!("{} finished in {:?}", name, elapsed);
        } else {
            tracing::debug!("{} failed after {:?}", name, elapsed);
        }
        drop(command);

        queue = lock(&shared.requests);
    }
    drop(queue);

    tracing::info!("Engine worker stopped");
    slot
}
