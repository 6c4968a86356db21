// Copyright 2026 Daniel Pelikan
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

//! Cancellable, joinable handle around a worker task.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Resolves when the owning handle cancels or is dropped.
pub(crate) type CancelSignal = oneshot::Receiver<()>;

/// What a worker task is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Accept,
    Connect,
    Connected,
}

/// Handle to the single active worker, tagged with the epoch it was
/// started in.
#[derive(Debug)]
pub struct WorkerHandle {
    epoch: u64,
    role: WorkerRole,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn a worker task, handing it the receiving end of its cancel signal.
    pub(crate) fn spawn<F, Fut>(epoch: u64, role: WorkerRole, start: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(start(cancel_rx));
        debug!("Started {:?} worker (epoch {})", role, epoch);

        Self {
            epoch,
            role,
            cancel: Some(cancel_tx),
            task,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    /// Ask the worker to stop. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Cancel the worker and wait until its task has fully exited.
    pub async fn join(mut self) {
        self.cancel();
        let Self {
            epoch, role, task, ..
        } = self;

        match task.await {
            Ok(()) => debug!("{:?} worker (epoch {}) finished", role, epoch),
            Err(e) if e.is_panic() => error!("{:?} worker (epoch {}) panicked: {}", role, epoch, e),
            Err(e) => debug!("{:?} worker (epoch {}) aborted: {}", role, epoch, e),
        }
    }
}
