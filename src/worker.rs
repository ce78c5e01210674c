// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background worker pool.
//!
//! A dedicated multi-threaded tokio runtime runs network fetches and route
//! resolution off the refresh thread. Every job is registered with a
//! [`TaskTracker`] so shutdown can wait for in-flight work before the runtime
//! is torn down. Results are delivered through completion callbacks that run
//! on a worker thread.

use std::future::Future;
use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::task::TaskTracker;

const THREAD_NAME: &str = "natrak-worker";

#[derive(Debug)]
pub struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    tracker: TaskTracker,
}

impl WorkerPool {
    pub fn new(worker_threads: usize) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name(THREAD_NAME)
            .enable_all()
            .build()?;
        debug!("Started worker pool with {} threads", worker_threads.max(1));

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            tracker: TaskTracker::new(),
        })
    }

    /// Run `job` on the pool and hand its output to `on_complete`.
    pub fn spawn<F, C>(&self, job: F, on_complete: C)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        C: FnOnce(F::Output) + Send + 'static,
    {
        if self.tracker.is_closed() {
            warn!("Worker pool is shutting down, dropping job");
            return;
        }
        self.tracker.spawn_on(
            async move {
                on_complete(job.await);
            },
            &self.handle,
        );
    }

    /// Run a CPU-bound `job` on the blocking pool.
    pub fn spawn_blocking<J, T, C>(&self, job: J, on_complete: C)
    where
        J: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        if self.tracker.is_closed() {
            warn!("Worker pool is shutting down, dropping job");
            return;
        }
        self.tracker
            .spawn_blocking_on(move || on_complete(job()), &self.handle);
    }

    /// Run a future to completion on the pool, blocking the caller.
    ///
    /// Must not be called from a worker thread.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Jobs spawned and not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work, wait up to `timeout` for in-flight jobs, then
    /// stop the runtime. Calling it again is a no-op.
    pub fn shutdown(&self, timeout: Duration) {
        let Some(runtime) = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        self.tracker.close();
        let drained = runtime
            .block_on(tokio::time::timeout(timeout, self.tracker.wait()))
            .is_ok();
        if drained {
            info!("Worker pool drained");
        } else {
            warn!(
                "Worker pool shutdown timed out with {} jobs pending",
                self.tracker.len()
            );
        }
        runtime.shutdown_timeout(Duration::from_millis(100));
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            self.tracker.close();
            runtime.shutdown_background();
        }
    }
}
