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

//! Point-to-point Bluetooth serial link.
//!
//! [`ConnectionManager`] keeps a single RFCOMM connection to one peer,
//! either accepted while listening or opened on request, and reports
//! everything that happens to it through an [`EventSink`].

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod state;

pub use error::LinkError;
pub use events::{ConnectionEvent, EventSink};
pub use link::{ConnectionManager, LinkSettings};
pub use state::ConnectionState;
