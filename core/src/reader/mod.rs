// Copyright 2025 HEM Sp. z o.o.
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

pub mod simulated;

use async_trait::async_trait;

use crate::definitions::{DeviceHandle, TagId};
use crate::errors::ReaderError;

/// Device layer the bridge drives.
///
/// Each call completes at most once. A call may also never complete (a reader
/// that stopped answering); callers bound every call with a deadline.
#[async_trait]
pub trait TagReader: Send + Sync {
    /// Enumerate connected readers.
    async fn discover_devices(&self) -> Result<Vec<DeviceHandle>, ReaderError>;

    /// Read the identifier of the tag presented to `device`.
    ///
    /// `Ok(None)` means the reader answered and no tag is present.
    async fn read_identifier(&self, device: &DeviceHandle) -> Result<Option<TagId>, ReaderError>;
}

pub use simulated::{SimulatedReader, SimulatedResponse};
