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

use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};

use crate::config::{BridgeConfig, ConfigSnapshot};
use crate::definitions::{OperationOutcome, OperationRequest, PollReport};
use crate::discovery::discover;
use crate::errors::BridgeError;
use crate::ipc::server::IpcServer;
use crate::poll_controller::{PollController, PollHandle};
use crate::reader::TagReader;
use crate::service::{spawn_service, ServiceHandle};
use crate::session::Session;
use crate::timed_operation::TimedOperation;

/// Operations offered to foreground clients. Backed by an in-process
/// implementation; the IPC server forwards every request to it.
#[async_trait]
pub trait TagBridge: Send + Sync {
    fn get_config(&self) -> ConfigSnapshot;

    /// Single discovery attempt bounded by the discovery timeout.
    async fn find_device(&self) -> Result<OperationOutcome, BridgeError>;

    /// Polls the bound reader for a tag and waits for the final report.
    ///
    /// `Ok(None)` means the wait was cancelled before it could report.
    async fn wait_for_tag(&self) -> Result<Option<PollReport>, BridgeError>;

    /// Cancels the active wait, if any.
    fn cancel_wait(&self);

    fn is_waiting(&self) -> bool;
}

/// Local, in-process implementation of [`TagBridge`].
pub struct LocalBridge {
    config: BridgeConfig,
    session: Arc<Session>,
    operation: TimedOperation,
    polls: Arc<PollController>,
}

impl LocalBridge {
    pub fn new(reader: Arc<dyn TagReader>, config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let operation = TimedOperation::new(reader);
        Ok(Self {
            config,
            session: Arc::new(Session::new()),
            polls: Arc::new(PollController::new(operation.clone())),
            operation,
        })
    }

    pub fn with_default_config(reader: Arc<dyn TagReader>) -> Result<Self, BridgeError> {
        Self::new(reader, BridgeConfig::default())
    }

    /// Accepts a wait for a tag on the bound reader without waiting for its outcome.
    pub fn start_wait(&self) -> Result<PollHandle, BridgeError> {
        let device = self.session.require_device()?;
        self.polls.start_poll(
            OperationRequest::ReadIdentifier(device),
            self.config.read_attempts,
            self.config.read_timeout_per_attempt,
        )
    }

    /// Serves this bridge over IPC at `endpoint` until the returned handle is shut down.
    ///
    /// A wait still active at shutdown is cancelled.
    pub fn run(self: Arc<Self>, endpoint: String) -> ServiceHandle {
        let server = IpcServer::with_endpoint(self.clone(), endpoint);
        spawn_service("IPC", move |stop| async move {
            if let Err(e) = server.serve_until(stop).await {
                error!("IPC server stopped with error: {:#}", e);
            }
            self.cancel_wait();
        })
    }
}

#[async_trait]
impl TagBridge for LocalBridge {
    fn get_config(&self) -> ConfigSnapshot {
        self.config.snapshot()
    }

    async fn find_device(&self) -> Result<OperationOutcome, BridgeError> {
        discover(&self.operation, &self.session, self.config.discovery_timeout).await
    }

    async fn wait_for_tag(&self) -> Result<Option<PollReport>, BridgeError> {
        let handle = self.start_wait()?;
        Ok(handle.wait().await)
    }

    fn cancel_wait(&self) {
        if let Some(id) = self.polls.cancel_active() {
            info!("Wait for tag cancelled ({})", id);
        }
    }

    fn is_waiting(&self) -> bool {
        self.polls.active_poll().is_some()
    }
}
