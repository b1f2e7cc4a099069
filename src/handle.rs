//! Engine handle lifecycle.
//!
//! One [`EngineHandle`] exists per process. It is created before the HTTP
//! listener, loads its engines in the background and moves through
//! `Initializing -> Ready -> Terminated` (or `Initializing -> Failed`).
//!
//! Recognition requests never touch an engine directly: they are queued on a
//! bounded channel and picked up by worker loops, each owning one engine
//! instance. Every job carries its own reply channel, so a result can only be
//! delivered to the request that submitted the image.

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::OcrConfig;
use crate::data_uri::DataUri;
use crate::engine::{EngineLoader, OcrEngine, Recognition};
use crate::error::OcrError;
use crate::retry::execute_with_retry_async;

/// Lifecycle phase of the engine handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePhase {
    /// Engines are still loading.
    Initializing,
    /// Accepting recognition calls.
    Ready,
    /// Initialization gave up; the handle stays non-ready.
    Failed { cause: String },
    /// Shutdown started; no further calls are accepted.
    Terminated,
}

impl EnginePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnginePhase::Initializing => "initializing",
            EnginePhase::Ready => "ready",
            EnginePhase::Failed { .. } => "failed",
            EnginePhase::Terminated => "terminated",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EnginePhase::Ready)
    }

    /// Initialization failure cause, if any.
    pub fn failure(&self) -> Option<&str> {
        match self {
            EnginePhase::Failed { cause } => Some(cause),
            _ => None,
        }
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Job {
    image: DataUri,
    reply: oneshot::Sender<Result<Recognition, OcrError>>,
}

/// Shared, cloneable handle to the engine workers.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Inner>,
}

struct Inner {
    phase: Arc<watch::Sender<EnginePhase>>,
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl EngineHandle {
    /// Start loading engines in the background and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<L: EngineLoader>(loader: L, config: OcrConfig) -> Self {
        let (phase_tx, _) = watch::channel(EnginePhase::Initializing);
        let phase = Arc::new(phase_tx);

        if let Err(err) = config.validate() {
            tracing::error!(error = %err, "OCR engine not started");
            phase.send_replace(EnginePhase::Failed {
                cause: err.to_string(),
            });
            return Self::from_parts(phase, None, None, config.shutdown_timeout);
        }

        let (job_tx, job_rx) = mpsc::channel(config.queue_capacity);
        let shutdown_timeout = config.shutdown_timeout;
        let supervisor = tokio::spawn(supervise(loader, config, phase.clone(), job_rx));

        Self::from_parts(phase, Some(job_tx), Some(supervisor), shutdown_timeout)
    }

    fn from_parts(
        phase: Arc<watch::Sender<EnginePhase>>,
        jobs: Option<mpsc::Sender<Job>>,
        supervisor: Option<JoinHandle<()>>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                phase,
                jobs: Mutex::new(jobs),
                supervisor: Mutex::new(supervisor),
                shutdown_timeout,
            }),
        }
    }

    /// Current phase snapshot.
    pub fn phase(&self) -> EnginePhase {
        self.inner.phase.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.phase.borrow().is_ready()
    }

    /// Resolve once initialization has finished one way or the other.
    pub async fn wait_ready(&self) -> EnginePhase {
        let mut rx = self.inner.phase.subscribe();
        let settled = match rx
            .wait_for(|phase| *phase != EnginePhase::Initializing)
            .await
        {
            Ok(phase) => phase.clone(),
            Err(_) => self.phase(),
        };
        settled
    }

    /// Queue `image` for recognition and wait for its result.
    pub async fn recognize(&self, image: DataUri) -> Result<Recognition, OcrError> {
        if !self.is_ready() {
            return Err(OcrError::NotReady);
        }

        let sender = self
            .inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(OcrError::NotReady)?;

        let (reply, response) = oneshot::channel();
        sender
            .send(Job { image, reply })
            .await
            .map_err(|_| OcrError::NotReady)?;
        drop(sender);

        response.await.map_err(|_| OcrError::WorkerGone)?
    }

    /// Stop accepting work, drain queued jobs and release the engines.
    ///
    /// Only the first call does anything. Teardown is bounded by the
    /// configured shutdown timeout; on expiry the workers are aborted.
    pub async fn terminate(&self) -> Result<(), OcrError> {
        let previous = self.inner.phase.send_replace(EnginePhase::Terminated);
        if previous == EnginePhase::Terminated {
            return Ok(());
        }
        tracing::info!(previous = %previous, "terminating OCR engine");

        // Closing the queue lets the workers finish what is already queued.
        self.inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let supervisor = self
            .inner
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut task) = supervisor else {
            return Ok(());
        };

        let timeout = self.inner.shutdown_timeout;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => {
                tracing::info!("OCR engine terminated");
                Ok(())
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "OCR engine supervisor crashed");
                Err(OcrError::WorkerGone)
            }
            Err(_) => {
                task.abort();
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "OCR engine termination timed out");
                Err(OcrError::TerminateTimeout(timeout))
            }
        }
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("phase", &self.phase())
            .finish()
    }
}

async fn supervise<L: EngineLoader>(
    loader: L,
    config: OcrConfig,
    phase: Arc<watch::Sender<EnginePhase>>,
    jobs: mpsc::Receiver<Job>,
) {
    let started = Instant::now();
    let terminated = || *phase.borrow() == EnginePhase::Terminated;
    let mut engines: Vec<Box<dyn OcrEngine>> = Vec::with_capacity(config.workers);

    for slot in 0..config.workers {
        let loader = &loader;
        let language = &config.language;
        let outcome = execute_with_retry_async(
            &config.retry,
            move |attempt| async move {
                tracing::debug!(slot, attempt, language = %language, "loading OCR engine");
                loader.load(language).await
            },
            terminated,
        )
        .await;

        match outcome.result {
            Ok(engine) => {
                if outcome.attempts > 1 {
                    tracing::info!(
                        slot,
                        attempts = outcome.attempts,
                        elapsed_ms = outcome.total_duration.as_millis() as u64,
                        "OCR engine loaded after retries"
                    );
                }
                engines.push(engine);
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    attempts = outcome.attempts,
                    elapsed_ms = outcome.total_duration.as_millis() as u64,
                    language = %config.language,
                    "OCR engine initialization failed"
                );
                for engine in engines {
                    release(slot, engine).await;
                }
                phase.send_if_modified(|current| {
                    if *current == EnginePhase::Terminated {
                        return false;
                    }
                    *current = EnginePhase::Failed {
                        cause: err.to_string(),
                    };
                    true
                });
                return;
            }
        }
    }

    let became_ready = phase.send_if_modified(|current| {
        if *current != EnginePhase::Initializing {
            return false;
        }
        *current = EnginePhase::Ready;
        true
    });
    if became_ready {
        tracing::info!(
            workers = engines.len(),
            engine = engines.first().map(|e| e.name()).unwrap_or_default(),
            language = %config.language,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR engine initialized"
        );
    }

    // If shutdown won the race the queue is already closed and every worker
    // exits on its first receive.
    let jobs = Arc::new(tokio::sync::Mutex::new(jobs));
    let mut workers = JoinSet::new();
    for (id, engine) in engines.into_iter().enumerate() {
        workers.spawn(work(id, engine, jobs.clone()));
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "OCR worker panicked");
        }
    }
}

async fn work(
    id: usize,
    engine: Box<dyn OcrEngine>,
    jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
) {
    loop {
        let next = jobs.lock().await.recv().await;
        let Some(job) = next else { break };

        // The caller timed out or disconnected while queued.
        if job.reply.is_closed() {
            continue;
        }

        let started = Instant::now();
        // A panicking engine fails this job only; the worker keeps serving.
        let result = AssertUnwindSafe(engine.recognize(&job.image))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let cause = panic_message(panic.as_ref());
                tracing::error!(worker = id, cause = %cause, "OCR engine panicked");
                Err(OcrError::Recognition(format!("engine panicked: {cause}")))
            });
        tracing::debug!(
            worker = id,
            mime = %job.image.mime(),
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recognition finished"
        );
        let _ = job.reply.send(result);
    }

    release(id, engine).await;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn release(id: usize, engine: Box<dyn OcrEngine>) {
    if let Err(err) = engine.terminate().await {
        tracing::warn!(worker = id, error = %err, "OCR engine termination failed");
    }
}
