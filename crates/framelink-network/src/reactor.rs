//! Background I/O thread shared by an endpoint's connections.
//!
//! Each endpoint owns one `Reactor`: a Tokio runtime with a single worker
//! thread. Every socket operation of that endpoint runs there, so application
//! threads never touch a socket directly.
//!
//! Stopping the reactor drops every task still scheduled on it. A task
//! spawned after `stop()` never runs.

use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::NetError;

/// How long `stop()` waits for in-flight tasks to unwind.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub(crate) struct Reactor {
    runtime: Option<Runtime>,
    name: &'static str,
}

impl Reactor {
    /// Start the I/O thread.
    pub(crate) fn start(name: &'static str) -> Result<Self, NetError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(name)
            .enable_all()
            .build()
            .map_err(NetError::Runtime)?;

        debug!(reactor = name, "Reactor started");
        Ok(Self {
            runtime: Some(runtime),
            name,
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    pub(crate) fn spawn<F>(&self, future: F) -> Option<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.as_ref().map(|rt| rt.spawn(future))
    }

    /// Run `future` to completion from a synchronous caller.
    ///
    /// Must not be called from inside an async context.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> Result<F::Output, NetError> {
        match &self.runtime {
            Some(rt) => Ok(rt.block_on(future)),
            None => Err(NetError::NotRunning),
        }
    }

    /// Stop the I/O thread and drop every pending task. Idempotent.
    pub(crate) fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
            debug!(reactor = self.name, "Reactor stopped");
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop();
    }
}
