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

//! Connected worker: read and write loops over an established channel.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::manager::Shared;
use super::worker::CancelSignal;
use crate::bluetooth::BoxChannel;
use crate::error::LinkError;

/// Worker that owns one channel and its outbound queue.
pub(crate) struct ConnectedWorker {
    shared: Arc<Shared>,
    epoch: u64,
    channel: BoxChannel,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    read_buffer_size: usize,
}

impl ConnectedWorker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        epoch: u64,
        channel: BoxChannel,
        outbound: mpsc::UnboundedReceiver<Vec<u8>>,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            shared,
            epoch,
            channel,
            outbound,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Run both loops until one fails or the worker is cancelled.
    ///
    /// A failure is reported to the manager before the channel is closed.
    /// The channel is closed exactly once, when this returns.
    pub(crate) async fn run(self, mut cancel: CancelSignal) {
        let Self {
            shared,
            epoch,
            channel,
            mut outbound,
            read_buffer_size,
        } = self;

        info!("Connection handler started");
        let (mut reader, mut writer) = tokio::io::split(channel);

        let exit = tokio::select! {
            biased;
            _ = &mut cancel => LinkError::Cancelled,
            e = read_loop(&shared, epoch, &mut reader, read_buffer_size) => e,
            e = write_loop(&shared, epoch, &mut writer, &mut outbound) => e,
        };

        if exit.is_cancelled() {
            debug!("Connection handler cancelled");
        } else {
            shared.on_connection_lost(epoch, exit);
        }

        let channel = reader.unsplit(writer);
        drop(channel);
        info!("Connection closed");
    }
}

/// Deliver everything read from `reader` until it fails or ends.
///
/// Each event carries exactly the bytes of one read; the rest of the
/// buffer is never looked at.
async fn read_loop<R>(shared: &Shared, epoch: u64, reader: &mut R, buffer_size: usize) -> LinkError
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("Connection closed by remote");
                return LinkError::ChannelClosed;
            }
            Ok(n) => {
                debug!("Received {} bytes", n);
                let received = &buffer[..n];
                if !shared.emit_if_current(epoch, |sink| sink.on_bytes_received(received)) {
                    return LinkError::Cancelled;
                }
            }
            Err(e) => {
                error!("Read error: {}", e);
                return LinkError::Io(e);
            }
        }
    }
}

/// Drain the outbound queue into `writer` in FIFO order.
///
/// Every attempted write is reported, whether it succeeded or not. The
/// loop ends when the queue's sender is dropped, which only happens when
/// the manager tears the connection down.
async fn write_loop<W>(
    shared: &Shared,
    epoch: u64,
    writer: &mut W,
    outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
) -> LinkError
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = outbound.recv().await {
        let result = write_frame(writer, &bytes).await;

        if !shared.emit_if_current(epoch, |sink| sink.on_bytes_sent(&bytes)) {
            return LinkError::Cancelled;
        }

        match result {
            Ok(()) => debug!("Sent {} bytes", bytes.len()),
            Err(e) => {
                error!("Write error: {}", e);
                return LinkError::Io(e);
            }
        }
    }

    LinkError::Cancelled
}

async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
