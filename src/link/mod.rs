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

//! Connection lifecycle: the manager and the workers it coordinates.
//!
//! At most one worker runs at a time. Listening is served by an accept
//! worker, outgoing attempts by a connect worker, and an established link
//! by a connected worker that runs a read loop and a write loop over the
//! channel.

mod accept;
mod connect;
mod connection;
mod manager;
mod worker;

use std::time::Duration;

use crate::bluetooth::ServiceId;

pub use manager::ConnectionManager;
pub(crate) use worker::{WorkerHandle, WorkerRole};

/// Default bound on a single outgoing attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(12);

/// Default size of the read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Tunables for the link core.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Service to listen on and connect to.
    pub service: ServiceId,
    /// Bound on a single outgoing attempt.
    pub connect_timeout: Duration,
    /// Maximum bytes delivered per `BytesReceived`.
    pub read_buffer_size: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            service: ServiceId::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}
