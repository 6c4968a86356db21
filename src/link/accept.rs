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

//! Accept worker: waits for one inbound connection.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::manager::Shared;
use super::worker::CancelSignal;
use crate::bluetooth::Acceptor;
use crate::error::LinkError;

/// Accept a single connection on `acceptor` and hand it to the manager.
///
/// The acceptor is dropped, closing the listening socket, as soon as the
/// wait ends for any reason.
pub(crate) async fn run(
    shared: Arc<Shared>,
    epoch: u64,
    mut acceptor: Box<dyn Acceptor>,
    mut cancel: CancelSignal,
) {
    info!("Waiting for connections...");

    let result = tokio::select! {
        biased;
        _ = &mut cancel => {
            debug!("Accept cancelled");
            return;
        }
        result = acceptor.accept() => result,
    };
    drop(acceptor);

    match result {
        Ok((channel, peer)) => {
            info!("Connection from: {}", peer.address);
            shared.accept_incoming(epoch, channel, peer);
        }
        Err(e) => {
            error!("Accept error: {}", e);
            shared.on_accept_failed(epoch, LinkError::Io(e));
        }
    }
}
