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

use std::future::Future;

use log::debug;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Handed to a background service; resolves its stop request.
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Resolves once [`ServiceHandle::shutdown`] was called or the handle was dropped.
    ///
    /// # Example
    /// ```rust
    /// use tag_bridge_core::spawn_service;
    ///
    /// async fn run_service() {
    ///     let handle = spawn_service("example", |stop| async move {
    ///         stop.signaled().await;
    ///         println!("Stop requested");
    ///     });
    ///     handle.shutdown().await.unwrap();
    /// }
    /// ```
    pub async fn signaled(&self) {
        self.token.cancelled().await
    }
}

/// Owner side of a background service. Dropping it stops the service too.
pub struct ServiceHandle {
    name: &'static str,
    join: JoinHandle<()>,
    stop: DropGuard,
}

impl ServiceHandle {
    /// Requests the stop and waits until the service task returned.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let Self { name, join, stop } = self;
        debug!("Stopping {} service", name);
        drop(stop);
        join.await
    }
}

/// Spawns the service built by `f` on the current tokio runtime.
pub fn spawn_service<Fut, Func>(name: &'static str, f: Func) -> ServiceHandle
where
    Fut: Future<Output = ()> + Send + 'static,
    Func: FnOnce(StopHandle) -> Fut,
{
    let token = CancellationToken::new();
    let service = f(StopHandle { token: token.clone() });
    let join = tokio::spawn(async move {
        service.await;
        debug!("{} service finished", name);
    });
    ServiceHandle { name, join, stop: token.drop_guard() }
}
