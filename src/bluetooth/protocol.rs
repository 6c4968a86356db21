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

//! Newline-terminated text messages layered on the raw byte stream.
//!
//! The link core moves opaque bytes. Chat front ends agree on one message
//! per line of UTF-8 text; these helpers build and split such lines.

use tracing::warn;

/// Message terminator.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Lines longer than this are emitted as-is rather than buffered further.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Encode a text message for `write`.
///
/// Returns `None` for an empty message, which is never sent.
pub fn encode_line(message: &str) -> Option<Vec<u8>> {
    if message.is_empty() {
        return None;
    }

    let mut bytes = Vec::with_capacity(message.len() + 1);
    bytes.extend_from_slice(message.as_bytes());
    bytes.push(LINE_TERMINATOR);
    Some(bytes)
}

/// Splits received bytes back into text lines.
///
/// Reads arrive in arbitrary chunks, so a line may span several of them.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes, returning every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            if byte == LINE_TERMINATOR {
                lines.push(self.take_line());
                continue;
            }

            self.buffer.push(byte);
            if self.buffer.len() >= MAX_LINE_LENGTH {
                warn!("Line exceeds {} bytes, emitting unterminated", MAX_LINE_LENGTH);
                lines.push(self.take_line());
            }
        }

        lines
    }

    /// Emit whatever partial line is buffered.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    /// Number of buffered bytes not yet forming a line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn take_line(&mut self) -> String {
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }
}
