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

//! Connect worker: a single outgoing attempt.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::manager::Shared;
use super::worker::CancelSignal;
use crate::bluetooth::{BoxChannel, PeerAddress, PeerIdentity, RadioAdapter};
use crate::error::{LinkError, Result};

/// Try once to open a channel to `peer` and report the outcome.
///
/// Nothing is reported if the attempt is cancelled. Retrying is left to
/// the caller.
pub(crate) async fn run(
    shared: Arc<Shared>,
    radio: Arc<dyn RadioAdapter>,
    epoch: u64,
    peer: PeerAddress,
    mut cancel: CancelSignal,
) {
    let result = tokio::select! {
        biased;
        _ = &mut cancel => {
            debug!("Connect to {} cancelled", peer);
            return;
        }
        result = attempt(&shared, radio.as_ref(), peer) => result,
    };

    if let Err(e) = &result {
        warn!("Connect to {} failed: {}", peer, e);
    }
    shared.on_connect_result(epoch, result);
}

async fn attempt(
    shared: &Shared,
    radio: &dyn RadioAdapter,
    peer: PeerAddress,
) -> Result<(BoxChannel, PeerIdentity)> {
    let service = shared.settings().service;
    let timeout = shared.settings().connect_timeout;
    info!("Connecting to {} on RFCOMM channel {}", peer, service.channel);

    let channel = match tokio::time::timeout(timeout, radio.open_outgoing(&peer, &service)).await {
        Ok(Ok(channel)) => channel,
        Ok(Err(source)) => return Err(LinkError::PeerUnreachable { peer, source }),
        Err(_) => return Err(LinkError::ConnectTimeout(timeout)),
    };

    let name = radio.peer_name(&peer).await;
    Ok((channel, PeerIdentity::new(peer, name)))
}
