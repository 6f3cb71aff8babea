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

use std::time::Duration;

use log::{info, warn};

use crate::definitions::{AttemptResult, OperationOutcome, OperationPayload, OperationRequest};
use crate::errors::BridgeError;
use crate::session::Session;
use crate::timed_operation::TimedOperation;

/// Looks for a reader once, bounded by `timeout`, and binds the first one found.
///
/// The session is left as it was unless a device was found.
pub async fn discover(operation: &TimedOperation, session: &Session, timeout: Duration) -> Result<OperationOutcome, BridgeError> {
    let result = operation.run(&OperationRequest::Discover, timeout).await?;
    match result {
        AttemptResult::Found(OperationPayload::Devices(devices)) => {
            if devices.len() > 1 {
                info!("{} readers found, using the first one", devices.len());
            }
            match devices.into_iter().next() {
                Some(device) => {
                    session.bind(device);
                    Ok(OperationOutcome::Found(None))
                }
                None => Ok(OperationOutcome::NotFound),
            }
        }
        AttemptResult::Found(OperationPayload::Tag(_)) => {
            warn!("Discovery produced a tag instead of a device list");
            Ok(OperationOutcome::NotFound)
        }
        AttemptResult::TimedOut => {
            info!("No reader answered within {:?}", timeout);
            Ok(OperationOutcome::NotFound)
        }
        AttemptResult::Absent | AttemptResult::Failed(_) => {
            info!("No reader found");
            Ok(OperationOutcome::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::definitions::DeviceHandle;
    use crate::reader::{SimulatedReader, SimulatedResponse};
    use tokio::time::Instant;

    #[tokio::test]
    async fn found_device_is_bound() {
        let reader = Arc::new(SimulatedReader::new().devices(vec![
            DeviceHandle::with_name("r1", "first"),
            DeviceHandle::with_name("r2", "second"),
        ]));
        let session = Session::new();

        let outcome = discover(&TimedOperation::new(reader.clone()), &session, Duration::from_millis(100)).await.unwrap();

        assert_eq!(outcome, OperationOutcome::Found(None));
        assert_eq!(session.device().unwrap().id, "r1");
        assert_eq!(reader.discover_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_driver_times_out_and_leaves_session_unbound() {
        let reader = Arc::new(SimulatedReader::new().discovery_hangs());
        let session = Session::new();
        let start = Instant::now();

        let outcome = discover(&TimedOperation::new(reader), &session, Duration::from_millis(5000)).await.unwrap();

        assert_eq!(outcome, OperationOutcome::NotFound);
        assert!(start.elapsed() >= Duration::from_millis(5000) && start.elapsed() < Duration::from_millis(5100));
        assert!(!session.is_bound());
    }

    #[tokio::test]
    async fn failed_rediscovery_keeps_previous_binding() {
        let reader = Arc::new(SimulatedReader::new()
            .push_discovery(Duration::ZERO, SimulatedResponse::Ready(vec![DeviceHandle::new("r1")]))
            .push_discovery(Duration::ZERO, SimulatedResponse::Fail("busy".into())));
        let session = Session::new();
        let op = TimedOperation::new(reader);

        assert!(discover(&op, &session, Duration::from_millis(100)).await.unwrap().is_found());
        assert!(!discover(&op, &session, Duration::from_millis(100)).await.unwrap().is_found());
        assert_eq!(session.device(), Some(DeviceHandle::new("r1")));
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let reader = Arc::new(SimulatedReader::with_device("sim"));
        let session = Session::new();
        let err = discover(&TimedOperation::new(reader.clone()), &session, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
        assert_eq!(reader.discover_calls(), 0);
    }
}
