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

//! Bluetooth transport.
//!
//! The link core talks to the radio through [`RadioAdapter`]. With the
//! `bluez` feature, [`BluezRadio`] provides it over RFCOMM.

pub mod protocol;
mod radio;
#[cfg(feature = "bluez")]
mod rfcomm;

pub use protocol::{encode_line, LineDecoder};
pub use radio::{
    Acceptor, BoxChannel, Channel, PeerAddress, PeerIdentity, RadioAdapter, ServiceId,
    RFCOMM_CHANNEL, SPP_UUID,
};
#[cfg(feature = "bluez")]
pub use rfcomm::BluezRadio;
