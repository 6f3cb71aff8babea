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

//! IPC server using parity-tokio-ipc for transport and MessagePack-RPC framing.
//!
//! Methods (all without parameters):
//! - `get_config`   -> `{discovery_timeout_ms, read_attempts, read_timeout_per_attempt_ms}`
//! - `find_device`  -> `{found}`
//! - `wait_for_tag` -> `{found, tag?: {id}, attempts, timeouts}`
//! - `cancel_wait`  -> nil
//! - `is_waiting`   -> `{waiting}`
//!
//! Every request is answered on its own future, so `cancel_wait` is served
//! while a `wait_for_tag` from the same client is still pending.

use std::sync::Arc;

use log::{debug, error, info, warn};
use parity_tokio_ipc::Endpoint;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::compat::TokioAsyncReadCompatExt;
use tokio::task::JoinSet;
use futures::StreamExt;

use crate::bridge::TagBridge;
use crate::definitions::PollReport;
use crate::errors::BridgeError;
use crate::service::StopHandle;

use msgpack_rpc::{serve, Service, Value};
use std::future::Future;
use std::pin::Pin;

pub const ENDPOINT_ENV_VAR: &str = "TAG_BRIDGE_IPC_ENDPOINT";

/// Endpoint from TAG_BRIDGE_IPC_ENDPOINT, or the platform default.
pub fn default_endpoint() -> String {
    if let Ok(override_ep) = std::env::var(ENDPOINT_ENV_VAR) {
        if !override_ep.trim().is_empty() {
            return override_ep;
        }
    }
    #[cfg(windows)]
    { r"\\.\pipe\tag_bridge_v1".to_string() }
    #[cfg(unix)]
    {
        let base = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
        format!("{base}/tag_bridge/tag_bridge.sock")
    }
}

/// Exposes a [`TagBridge`] over a local IPC endpoint.
pub struct IpcServer {
    endpoint: String,
    bridge: Arc<dyn TagBridge>,
}

impl IpcServer {
    pub fn with_endpoint(bridge: Arc<dyn TagBridge>, endpoint: String) -> Self {
        Self { endpoint, bridge }
    }

    /// Accepts clients until `stop` is signaled or the accept loop fails.
    pub async fn serve_until(&self, stop: StopHandle) -> anyhow::Result<()> {
        let endpoint = &self.endpoint;
        info!("Tag bridge IPC server listening on: {}", endpoint);

        #[cfg(unix)]
        {
            if let Some(parent) = std::path::Path::new(endpoint).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            // stale socket from a previous run
            let _ = std::fs::remove_file(endpoint);
        }

        let incoming = Endpoint::new(endpoint.clone()).incoming()
            .map_err(|e| anyhow::anyhow!("Failed to start IPC endpoint: {e}"))?;

        let mut tasks = JoinSet::new();
        tokio::pin!(incoming);
        loop {
            tokio::select! {
                _ = stop.signaled() => {
                    debug!("IPC server shutdown requested");
                    break;
                }
                next = incoming.next() => match next {
                    Some(Ok(stream)) => {
                        let bridge = self.bridge.clone();
                        tasks.spawn(async move {
                            if let Err(e) = handle_connection(stream, bridge).await {
                                warn!("IPC connection handler ended with error: {e:?}");
                            }
                        });
                    }
                    Some(Err(e)) => {
                        error!("IPC accept failed: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            while let Some(res) = tasks.try_join_next() {
                if let Err(e) = res { warn!("IPC connection task panicked: {e:?}"); }
            }
        }

        tasks.shutdown().await;
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(endpoint);
        }
        Ok(())
    }
}

async fn handle_connection<S>(stream: S, bridge: Arc<dyn TagBridge>) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    debug!("New IPC client connected");

    #[derive(Clone)]
    struct TagBridgeRpcService {
        bridge: Arc<dyn TagBridge>,
    }

    impl Service for TagBridgeRpcService {
        type RequestFuture = Pin<Box<dyn Future<Output = Result<Value, Value>> + Send>>;

        fn handle_request(&mut self, method: &str, params: &[Value]) -> Self::RequestFuture {
            let bridge = self.bridge.clone();
            let method = method.to_string();
            let param_len = params.len();
            Box::pin(async move { dispatch(bridge.as_ref(), &method, param_len).await })
        }

        fn handle_notification(&mut self, method: &str, _params: &[Value]) {
            debug!("Ignoring IPC notification: {}", method);
        }
    }

    let service = TagBridgeRpcService { bridge };
    let mut compat_stream = stream.compat();
    serve(&mut compat_stream, service)
        .await
        .map_err(|e| anyhow::anyhow!("msgpack-rpc serve error: {}", e))
}

/// Runs one request against the bridge and encodes the reply.
pub(crate) async fn dispatch(bridge: &dyn TagBridge, method: &str, param_len: usize) -> Result<Value, Value> {
    if param_len != 0 {
        return Err("params not expected".into());
    }
    match method {
        "get_config" => {
            let config = bridge.get_config();
            Ok(Value::Map(vec![
                (Value::from("discovery_timeout_ms"), Value::from(config.discovery_timeout_ms)),
                (Value::from("read_attempts"), Value::from(u64::from(config.read_attempts))),
                (Value::from("read_timeout_per_attempt_ms"), Value::from(config.read_timeout_per_attempt_ms)),
            ]))
        }
        "find_device" => {
            let outcome = bridge.find_device().await.map_err(error_value)?;
            Ok(Value::Map(vec![(Value::from("found"), Value::from(outcome.is_found()))]))
        }
        "wait_for_tag" => match bridge.wait_for_tag().await.map_err(error_value)? {
            Some(report) => Ok(report_value(&report)),
            None => Err("wait cancelled".into()),
        },
        "cancel_wait" => {
            bridge.cancel_wait();
            Ok(Value::Nil)
        }
        "is_waiting" => Ok(Value::Map(vec![(Value::from("waiting"), Value::from(bridge.is_waiting()))])),
        _ => Err(format!("unknown method: {}", method).into()),
    }
}

fn report_value(report: &PollReport) -> Value {
    let mut fields = vec![(Value::from("found"), Value::from(report.outcome.is_found()))];
    if let Some(tag) = report.outcome.tag() {
        fields.push((Value::from("tag"), Value::Map(vec![(Value::from("id"), Value::from(tag.as_str()))])));
    }
    fields.push((Value::from("attempts"), Value::from(u64::from(report.attempts))));
    fields.push((Value::from("timeouts"), Value::from(u64::from(report.timeouts))));
    Value::Map(fields)
}

fn error_value(error: BridgeError) -> Value {
    match error {
        BridgeError::AlreadyPolling(_) => "already waiting for tag".into(),
        BridgeError::NoDeviceBound => "no device bound".into(),
        other => other.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::bridge::LocalBridge;
    use crate::config::BridgeConfig;
    use crate::definitions::TagId;
    use crate::reader::{SimulatedReader, SimulatedResponse};

    fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
        match value {
            Value::Map(entries) => entries.iter().find(|(k, _)| k.as_str() == Some(key)).map(|(_, v)| v),
            _ => None,
        }
    }

    fn bridge(reader: SimulatedReader) -> Arc<LocalBridge> {
        Arc::new(LocalBridge::new(Arc::new(reader), BridgeConfig::from_millis(500, 10, 100).unwrap()).unwrap())
    }

    #[tokio::test]
    async fn get_config_reports_milliseconds() {
        let bridge = bridge(SimulatedReader::new());
        let reply = dispatch(bridge.as_ref(), "get_config", 0).await.unwrap();
        assert_eq!(field(&reply, "discovery_timeout_ms").and_then(Value::as_u64), Some(500));
        assert_eq!(field(&reply, "read_attempts").and_then(Value::as_u64), Some(10));
        assert_eq!(field(&reply, "read_timeout_per_attempt_ms").and_then(Value::as_u64), Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn find_then_wait_returns_tag() {
        let bridge = bridge(SimulatedReader::with_device("sim").tag_after(1, TagId::from("04A1"), Duration::from_millis(10)));

        let found = dispatch(bridge.as_ref(), "find_device", 0).await.unwrap();
        assert_eq!(field(&found, "found").and_then(Value::as_bool), Some(true));

        let reply = dispatch(bridge.as_ref(), "wait_for_tag", 0).await.unwrap();
        assert_eq!(field(&reply, "found").and_then(Value::as_bool), Some(true));
        let tag = field(&reply, "tag").unwrap();
        assert_eq!(field(tag, "id").and_then(Value::as_str), Some("04A1"));
        assert_eq!(field(&reply, "attempts").and_then(Value::as_u64), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_wait_has_no_tag() {
        let bridge = bridge(SimulatedReader::with_device("sim"));
        dispatch(bridge.as_ref(), "find_device", 0).await.unwrap();

        let reply = dispatch(bridge.as_ref(), "wait_for_tag", 0).await.unwrap();
        assert_eq!(field(&reply, "found").and_then(Value::as_bool), Some(false));
        assert!(field(&reply, "tag").is_none());
        assert_eq!(field(&reply, "attempts").and_then(Value::as_u64), Some(10));
    }

    #[tokio::test]
    async fn wait_without_device_is_an_error() {
        let bridge = bridge(SimulatedReader::new());
        let err = dispatch(bridge.as_ref(), "wait_for_tag", 0).await.unwrap_err();
        assert_eq!(err.as_str(), Some("no device bound"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_wait_is_rejected_and_cancel_ends_the_first() {
        let bridge = bridge(SimulatedReader::with_device("sim")
            .read_fallback(Duration::from_millis(50), SimulatedResponse::Ready(None)));
        dispatch(bridge.as_ref(), "find_device", 0).await.unwrap();

        let first = {
            let bridge = bridge.clone();
            tokio::spawn(async move { dispatch(bridge.as_ref(), "wait_for_tag", 0).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiting = dispatch(bridge.as_ref(), "is_waiting", 0).await.unwrap();
        assert_eq!(field(&waiting, "waiting").and_then(Value::as_bool), Some(true));

        let second = dispatch(bridge.as_ref(), "wait_for_tag", 0).await.unwrap_err();
        assert_eq!(second.as_str(), Some("already waiting for tag"));

        assert_eq!(dispatch(bridge.as_ref(), "cancel_wait", 0).await.unwrap(), Value::Nil);
        let first = first.await.unwrap().unwrap_err();
        assert_eq!(first.as_str(), Some("wait cancelled"));

        let waiting = dispatch(bridge.as_ref(), "is_waiting", 0).await.unwrap();
        assert_eq!(field(&waiting, "waiting").and_then(Value::as_bool), Some(false));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wait_is_cancelled_over_the_socket() {
        use msgpack_rpc::Client;

        let path = std::env::temp_dir().join(format!("tag_bridge_ipc_{}.sock", std::process::id()));
        let bridge = bridge(SimulatedReader::with_device("sim")
            .read_fallback(Duration::from_millis(50), SimulatedResponse::Ready(None)));
        let server = bridge.clone().run(path.to_string_lossy().into_owned());

        let mut connection = None;
        for _ in 0..50 {
            match Endpoint::connect(&path).await {
                Ok(conn) => {
                    connection = Some(conn);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        let client = Client::new(connection.expect("IPC endpoint never came up").compat());

        let found = client.request("find_device", &[]).await.unwrap();
        assert_eq!(field(&found, "found").and_then(Value::as_bool), Some(true));

        let wait = client.request("wait_for_tag", &[]);
        let mut waiting = false;
        for _ in 0..50 {
            let reply = client.request("is_waiting", &[]).await.unwrap();
            waiting = field(&reply, "waiting").and_then(Value::as_bool) == Some(true);
            if waiting {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(waiting);

        assert_eq!(client.request("cancel_wait", &[]).await.unwrap(), Value::Nil);
        let err = wait.await.unwrap_err();
        assert_eq!(err.as_str(), Some("wait cancelled"));

        server.shutdown().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn cancel_without_wait_is_acknowledged() {
        let bridge = bridge(SimulatedReader::new());
        assert_eq!(dispatch(bridge.as_ref(), "cancel_wait", 0).await.unwrap(), Value::Nil);
    }

    #[tokio::test]
    async fn bad_requests_are_rejected() {
        let bridge = bridge(SimulatedReader::new());
        let err = dispatch(bridge.as_ref(), "is_waiting", 1).await.unwrap_err();
        assert_eq!(err.as_str(), Some("params not expected"));
        let err = dispatch(bridge.as_ref(), "read_everything", 0).await.unwrap_err();
        assert_eq!(err.as_str(), Some("unknown method: read_everything"));
    }
}
