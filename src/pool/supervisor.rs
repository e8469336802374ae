//! Pool startup.
//!
//! # Responsibilities
//! - Start exactly `worker_count()` workers
//! - Hand each worker its own serialized copy of the configuration, out of
//!   band from the request channel
//! - Log process exits
//!
//! # Design Decisions
//! - Fail fast: any spawn error is fatal, nothing is retried
//! - Process workers re-run the current executable with a hidden `worker`
//!   subcommand; stdin/stdout carry envelopes, stderr carries logs
//! - Child processes are killed if the front end drops them

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;
use tokio::process::Command;
use tracing::Instrument;

use crate::config::loader::{from_snapshot, to_snapshot, ConfigError, WORKER_CONFIG_ENV};
use crate::config::{Isolation, ProxyConfig};
use crate::pool::{selector, WorkerHandle, WorkerPool};
use crate::worker::{self, Worker, WORKER_INDEX_ENV};

/// Errors that abort pool startup.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to prepare worker configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to locate worker executable: {0}")]
    Executable(std::io::Error),

    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        source: std::io::Error,
    },

    #[error("worker {0} was spawned without piped stdio")]
    MissingPipe(usize),
}

/// The program and arguments used to start a worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// The running executable with the `worker` subcommand.
    pub fn current_exe() -> Result<Self, SupervisorError> {
        let program = std::env::current_exe().map_err(SupervisorError::Executable)?;
        Ok(Self::new(program).arg("worker"))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Start the pool described by `config`, re-running this executable for
/// process workers.
pub fn start(config: &ProxyConfig) -> Result<WorkerPool, SupervisorError> {
    match config.server.isolation {
        Isolation::Process => launch(config, Some(&WorkerCommand::current_exe()?)),
        Isolation::Task => launch(config, None),
    }
}

/// Start the pool, using `command` for process workers. Task workers ignore it.
pub fn start_with(
    config: &ProxyConfig,
    command: &WorkerCommand,
) -> Result<WorkerPool, SupervisorError> {
    launch(config, Some(command))
}

fn launch(
    config: &ProxyConfig,
    command: Option<&WorkerCommand>,
) -> Result<WorkerPool, SupervisorError> {
    let count = config.server.worker_count();
    let snapshot = to_snapshot(config)?;

    let mut workers = Vec::with_capacity(count);
    for index in 0..count {
        let handle = match (config.server.isolation, command) {
            (Isolation::Process, Some(command)) => spawn_process(index, command, &snapshot)?,
            _ => spawn_task(index, &snapshot)?,
        };
        tracing::info!(worker = index, pid = ?handle.pid(), "Worker started");
        workers.push(handle);
    }

    tracing::info!(
        workers = count,
        isolation = ?config.server.isolation,
        balance = ?config.server.balance,
        "Worker pool started"
    );

    Ok(WorkerPool::new(workers, selector::from_strategy(config.server.balance)))
}

fn spawn_process(
    index: usize,
    command: &WorkerCommand,
    snapshot: &str,
) -> Result<WorkerHandle, SupervisorError> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .env(WORKER_CONFIG_ENV, snapshot)
        .env(WORKER_INDEX_ENV, index.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| SupervisorError::Spawn { index, source })?;

    let stdin = child.stdin.take().ok_or(SupervisorError::MissingPipe(index))?;
    let stdout = child.stdout.take().ok_or(SupervisorError::MissingPipe(index))?;
    let pid = child.id();

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => tracing::warn!(worker = index, ?pid, %status, "Worker process exited"),
            Err(e) => tracing::error!(
                worker = index,
                ?pid,
                error = %e,
                "Failed to wait on worker process"
            ),
        }
    });

    Ok(WorkerHandle::connect(index, stdout, stdin).with_pid(pid))
}

fn spawn_task(index: usize, snapshot: &str) -> Result<WorkerHandle, SupervisorError> {
    // Each task worker builds from its own copy, exactly like a process would.
    let config = from_snapshot(snapshot)?;
    let worker = Arc::new(Worker::new(&config));

    let (front, back) = tokio::io::duplex(64 * 1024);
    let (back_read, back_write) = tokio::io::split(back);
    let (front_read, front_write) = tokio::io::split(front);

    let span = tracing::info_span!("worker", index);
    tokio::spawn(
        async move {
            if let Err(e) = worker::serve(worker, back_read, back_write).await {
                tracing::error!(error = %e, "Worker task stopped");
            }
        }
        .instrument(span),
    );

    Ok(WorkerHandle::connect(index, front_read, front_write))
}
