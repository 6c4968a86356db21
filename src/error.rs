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

//! Error types for the link core.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::bluetooth::PeerAddress;
use crate::state::ConnectionState;

/// Errors produced by the connection manager and its workers.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The radio is switched off or absent.
    #[error("Bluetooth radio is not available")]
    RadioUnavailable,

    /// The outgoing attempt did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The peer refused or could not be reached.
    #[error("unable to connect to {peer}: {source}")]
    PeerUnreachable {
        peer: PeerAddress,
        #[source]
        source: io::Error,
    },

    /// The remote side closed the stream.
    #[error("connection closed by remote")]
    ChannelClosed,

    /// Read or write failure on an established channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),

    /// `write` was called without an established connection.
    #[error("not connected")]
    NotConnected,

    /// Deliberate teardown. Never reported to the event sink.
    #[error("cancelled")]
    Cancelled,

    /// The requested operation is not valid in the current state.
    #[error("link is busy ({0})")]
    Busy(ConnectionState),

    /// A peer address string could not be parsed.
    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),

    #[cfg(feature = "bluez")]
    #[error("BlueZ error: {0}")]
    Bluez(#[from] bluer::Error),
}

impl LinkError {
    /// Whether this error marks a deliberate teardown rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LinkError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
