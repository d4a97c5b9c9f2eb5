//! Computation offload service
//!
//! One background worker thread per service instance. The render thread
//! talks to it over channels only; sampled vectors are moved through the
//! channel, never copied. Each solve request carries its own reply channel,
//! so a reply can never resolve the wrong request even if the runtime
//! reorders deliveries.

use crate::equation::Equation;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lifecycle of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed but no worker running (also the post-shutdown state).
    Uninitialized,
    /// Worker spawned, init handshake not yet observed.
    Initializing,
    /// Handshake received; solve requests are accepted.
    Ready,
    /// Worker failed to come up; requests are rejected locally.
    Failed,
}

/// Errors surfaced to solve callers
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("computation service is not ready (state: {0:?})")]
    NotReady(ServiceState),

    #[error("computation service failed to initialize: {0}")]
    InitFailed(String),

    #[error("timed out waiting for the computation service")]
    Timeout,

    #[error("computation worker terminated unexpectedly")]
    WorkerGone,

    #[error("solve failed: {0}")]
    Solve(String),
}

pub type ComputeResult<T> = Result<T, ComputeError>;

/// A solved sampling: two equal-length arrays, moved out of the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
}

/// Requests crossing into the worker.
enum WorkerRequest {
    Solve(SolveRequest),
    Shutdown,
}

struct SolveRequest {
    id: u64,
    equation: String,
    variable: String,
    x_min: f64,
    x_max: f64,
    num_points: usize,
    /// Per-request reply channel: correlation by construction.
    reply: mpsc::Sender<WorkerReply>,
}

enum WorkerReply {
    Solved {
        id: u64,
        x_values: Vec<f64>,
        y_values: Vec<f64>,
    },
    Failed {
        id: u64,
        message: String,
    },
}

/// One-shot init handshake.
enum InitReply {
    Ready,
    Error(String),
}

/// Handle to one background computation worker.
///
/// `solve` takes `&mut self`, which makes a second in-flight solve on the
/// same instance a compile error rather than an unenforced convention.
pub struct ComputeService {
    requests: Option<mpsc::Sender<WorkerRequest>>,
    worker: Option<JoinHandle<()>>,
    init_rx: Option<mpsc::Receiver<InitReply>>,
    state: ServiceState,
    failure: Option<String>,
    next_request_id: u64,
}

impl ComputeService {
    fn idle() -> Self {
        Self {
            requests: None,
            worker: None,
            init_rx: None,
            state: ServiceState::Uninitialized,
            failure: None,
            next_request_id: 0,
        }
    }

    /// Spawn the worker thread and return immediately; the service reaches
    /// `Ready` once the init handshake arrives.
    pub fn spawn() -> Self {
        let mut service = Self::idle();
        service.start();
        service
    }

    fn start(&mut self) {
        let (request_tx, request_rx) = mpsc::channel();
        let (init_tx, init_rx) = mpsc::channel();
        match thread::Builder::new()
            .name("physviz-compute".to_string())
            .spawn(move || worker_loop(request_rx, init_tx))
        {
            Ok(handle) => {
                self.requests = Some(request_tx);
                self.worker = Some(handle);
                self.init_rx = Some(init_rx);
                self.state = ServiceState::Initializing;
            }
            Err(err) => {
                log::error!("failed to spawn computation worker: {}", err);
                self.state = ServiceState::Failed;
                self.failure = Some(err.to_string());
            }
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Consume the init handshake if it has arrived. Non-blocking.
    pub fn poll_ready(&mut self) -> ServiceState {
        if self.state == ServiceState::Initializing {
            if let Some(rx) = &self.init_rx {
                match rx.try_recv() {
                    Ok(InitReply::Ready) => {
                        self.state = ServiceState::Ready;
                        self.init_rx = None;
                    }
                    Ok(InitReply::Error(message)) => {
                        log::error!("computation worker failed to initialize: {}", message);
                        self.state = ServiceState::Failed;
                        self.failure = Some(message);
                        self.init_rx = None;
                    }
                    Err(mpsc::TryRecvError::Empty) => {}
                    Err(mpsc::TryRecvError::Disconnected) => {
                        self.state = ServiceState::Failed;
                        self.failure = Some("worker exited before handshake".to_string());
                        self.init_rx = None;
                    }
                }
            }
        }
        self.state
    }

    /// Block until the service is `Ready`, or fail with the init error or a
    /// timeout.
    pub fn wait_ready(&mut self, timeout: Duration) -> ComputeResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.poll_ready() {
                ServiceState::Ready => return Ok(()),
                ServiceState::Failed => {
                    return Err(ComputeError::InitFailed(
                        self.failure.clone().unwrap_or_default(),
                    ));
                }
                ServiceState::Uninitialized => {
                    return Err(ComputeError::NotReady(ServiceState::Uninitialized));
                }
                ServiceState::Initializing => {
                    if Instant::now() >= deadline {
                        return Err(ComputeError::Timeout);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    /// Sample `equation` at `num_points` evenly spaced points over
    /// `[x_min, x_max]`. Blocks until the matching reply arrives.
    ///
    /// Rejected locally (never forwarded) when the service is not `Ready`.
    pub fn solve(
        &mut self,
        equation: &str,
        variable: &str,
        x_min: f64,
        x_max: f64,
        num_points: usize,
    ) -> ComputeResult<Solution> {
        match self.poll_ready() {
            ServiceState::Ready => {}
            ServiceState::Failed => {
                return Err(ComputeError::InitFailed(
                    self.failure.clone().unwrap_or_default(),
                ));
            }
            state => return Err(ComputeError::NotReady(state)),
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        let (reply_tx, reply_rx) = mpsc::channel();
        let request = SolveRequest {
            id,
            equation: equation.to_string(),
            variable: variable.to_string(),
            x_min,
            x_max,
            num_points,
            reply: reply_tx,
        };

        self.requests
            .as_ref()
            .ok_or(ComputeError::WorkerGone)?
            .send(WorkerRequest::Solve(request))
            .map_err(|_| ComputeError::WorkerGone)?;

        match reply_rx.recv() {
            Ok(WorkerReply::Solved { id: reply_id, x_values, y_values }) => {
                debug_assert_eq!(reply_id, id, "reply correlation broken");
                Ok(Solution { x_values, y_values })
            }
            Ok(WorkerReply::Failed { message, .. }) => Err(ComputeError::Solve(message)),
            Err(_) => Err(ComputeError::WorkerGone),
        }
    }

    /// `solve` with the standard defaults: variable "x", interval [-10, 10],
    /// 100 samples.
    pub fn solve_default(&mut self, equation: &str) -> ComputeResult<Solution> {
        self.solve(equation, "x", -10.0, 10.0, 100)
    }

    /// Dispose the worker. Safe to call repeatedly and on an instance that
    /// already failed or never started.
    pub fn shutdown(&mut self) {
        if let Some(requests) = self.requests.take() {
            let _ = requests.send(WorkerRequest::Shutdown);
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("computation worker panicked during shutdown");
            }
        }
        self.init_rx = None;
        self.state = ServiceState::Uninitialized;
    }
}

impl Drop for ComputeService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(requests: mpsc::Receiver<WorkerRequest>, init: mpsc::Sender<InitReply>) {
    // Startup self-check doubles as the init handshake payload.
    let probe = Equation::parse("1 + 1").and_then(|eq| eq.eval("x", 0.0));
    match probe {
        Ok(_) => {
            if init.send(InitReply::Ready).is_err() {
                return;
            }
        }
        Err(err) => {
            let _ = init.send(InitReply::Error(err.to_string()));
            return;
        }
    }

    while let Ok(request) = requests.recv() {
        match request {
            WorkerRequest::Solve(solve) => {
                let reply = run_solve(&solve);
                // The requester may have given up; a dead reply channel is
                // not a worker failure.
                let _ = solve.reply.send(reply);
            }
            WorkerRequest::Shutdown => break,
        }
    }
}

/// All failure modes are folded into a `Failed` reply; a bad equation must
/// never take the worker down.
fn run_solve(request: &SolveRequest) -> WorkerReply {
    let sampled = Equation::parse(&request.equation).and_then(|eq| {
        eq.sample(
            &request.variable,
            request.x_min,
            request.x_max,
            request.num_points,
        )
    });
    match sampled {
        Ok((x_values, y_values)) => WorkerReply::Solved {
            id: request.id,
            x_values,
            y_values,
        },
        Err(err) => WorkerReply::Failed {
            id: request.id,
            message: err.to_string(),
        },
    }
}
