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

use std::sync::Mutex;

use log::info;

use crate::definitions::DeviceHandle;
use crate::errors::BridgeError;

/// Binding between a discovered reader and the operations issued on it.
///
/// Set by discovery, read by tag polling. Re-discovery replaces the binding.
#[derive(Default)]
pub struct Session {
    device: Mutex<Option<DeviceHandle>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, device: DeviceHandle) {
        info!("Reader bound: {}", device);
        *self.device.lock().unwrap() = Some(device);
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.device.lock().unwrap().clone()
    }

    pub fn require_device(&self) -> Result<DeviceHandle, BridgeError> {
        self.device().ok_or(BridgeError::NoDeviceBound)
    }

    pub fn is_bound(&self) -> bool {
        self.device.lock().unwrap().is_some()
    }

    pub fn clear(&self) -> Option<DeviceHandle> {
        self.device.lock().unwrap().take()
    }
}
