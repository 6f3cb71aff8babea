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

//! Scripted reader used for testing the bridge without connecting a device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::trace;

use crate::definitions::{DeviceHandle, TagId};
use crate::errors::ReaderError;
use crate::reader::TagReader;

/// What a scripted call answers once its latency has elapsed.
#[derive(Debug, Clone)]
pub enum SimulatedResponse<T> {
    Ready(T),
    Fail(String),
    /// Never answers.
    Hang,
}

#[derive(Debug, Clone)]
struct Step<T> {
    latency: Duration,
    response: SimulatedResponse<T>,
}

impl<T> Step<T> {
    fn immediate(response: SimulatedResponse<T>) -> Self {
        Self { latency: Duration::ZERO, response }
    }
}

async fn play<T>(step: Step<T>) -> Result<T, ReaderError> {
    if !step.latency.is_zero() {
        tokio::time::sleep(step.latency).await;
    }
    match step.response {
        SimulatedResponse::Ready(value) => Ok(value),
        SimulatedResponse::Fail(reason) => Err(ReaderError::Other(reason)),
        SimulatedResponse::Hang => futures::future::pending().await,
    }
}

/// Reader whose answers are scripted up front.
///
/// Queued steps are consumed in order; once the queue is empty the fallback
/// step answers every further call.
pub struct SimulatedReader {
    discover_queue: Mutex<VecDeque<Step<Vec<DeviceHandle>>>>,
    discover_fallback: Step<Vec<DeviceHandle>>,
    read_queue: Mutex<VecDeque<Step<Option<TagId>>>>,
    read_fallback: Step<Option<TagId>>,
    discover_calls: AtomicU32,
    read_calls: AtomicU32,
}

impl Default for SimulatedReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedReader {
    /// Reader with no devices that reports an empty field on every read.
    pub fn new() -> Self {
        Self {
            discover_queue: Mutex::new(VecDeque::new()),
            discover_fallback: Step::immediate(SimulatedResponse::Ready(Vec::new())),
            read_queue: Mutex::new(VecDeque::new()),
            read_fallback: Step::immediate(SimulatedResponse::Ready(None)),
            discover_calls: AtomicU32::new(0),
            read_calls: AtomicU32::new(0),
        }
    }

    /// Reader exposing a single device named `name`.
    pub fn with_device(name: &str) -> Self {
        Self::new().devices(vec![DeviceHandle::with_name("sim-0", name)])
    }

    pub fn devices(mut self, devices: Vec<DeviceHandle>) -> Self {
        self.discover_fallback.response = SimulatedResponse::Ready(devices);
        self
    }

    pub fn discovery_latency(mut self, latency: Duration) -> Self {
        self.discover_fallback.latency = latency;
        self
    }

    pub fn discovery_hangs(mut self) -> Self {
        self.discover_fallback.response = SimulatedResponse::Hang;
        self
    }

    pub fn push_discovery(self, latency: Duration, response: SimulatedResponse<Vec<DeviceHandle>>) -> Self {
        self.discover_queue.lock().unwrap().push_back(Step { latency, response });
        self
    }

    pub fn push_read(self, latency: Duration, response: SimulatedResponse<Option<TagId>>) -> Self {
        self.read_queue.lock().unwrap().push_back(Step { latency, response });
        self
    }

    /// Answer for every read once the queue is drained.
    pub fn read_fallback(mut self, latency: Duration, response: SimulatedResponse<Option<TagId>>) -> Self {
        self.read_fallback = Step { latency, response };
        self
    }

    /// `empty_reads` reads report no tag, every later read reports `tag`.
    pub fn tag_after(self, empty_reads: u32, tag: TagId, latency: Duration) -> Self {
        let mut reader = self;
        for _ in 0..empty_reads {
            reader = reader.push_read(latency, SimulatedResponse::Ready(None));
        }
        reader.read_fallback(latency, SimulatedResponse::Ready(Some(tag)))
    }

    pub fn discover_calls(&self) -> u32 {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagReader for SimulatedReader {
    async fn discover_devices(&self) -> Result<Vec<DeviceHandle>, ReaderError> {
        let call = self.discover_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self.discover_queue.lock().unwrap().pop_front()
            .unwrap_or_else(|| self.discover_fallback.clone());
        trace!("Simulated discovery call {}", call);
        play(step).await
    }

    async fn read_identifier(&self, device: &DeviceHandle) -> Result<Option<TagId>, ReaderError> {
        let call = self.read_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self.read_queue.lock().unwrap().pop_front()
            .unwrap_or_else(|| self.read_fallback.clone());
        trace!("Simulated read call {} on {}", call, device);
        play(step).await
    }
}
