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
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::select;

use crate::config::validate_deadline;
use crate::definitions::{AttemptResult, OperationPayload, OperationRequest};
use crate::errors::{BridgeError, ReaderError};
use crate::reader::TagReader;

/// Races `operation` against a `deadline` timer and reports exactly one result.
///
/// Whichever side finishes first wins; the other one is dropped, so a late
/// timer can never report over a completed operation (and vice versa).
/// `Ok(None)` from the operation is a confirmed absence.
pub async fn run_with_deadline<T, F>(operation: F, deadline: Duration) -> Result<AttemptResult<T>, BridgeError>
where
    F: Future<Output = Result<Option<T>, ReaderError>>,
{
    validate_deadline("deadline", deadline)?;

    let result = select! {
        biased;
        res = operation => match res {
            Ok(Some(value)) => AttemptResult::Found(value),
            Ok(None) => AttemptResult::Absent,
            Err(e) => {
                warn!("Device operation failed: {}", e);
                AttemptResult::Failed(e.to_string())
            }
        },
        _ = tokio::time::sleep(deadline) => AttemptResult::TimedOut,
    };
    Ok(result)
}

/// Executes single device operations against a reader, each bounded by a deadline.
#[derive(Clone)]
pub struct TimedOperation {
    reader: Arc<dyn TagReader>,
}

impl TimedOperation {
    pub fn new(reader: Arc<dyn TagReader>) -> Self {
        Self { reader }
    }

    pub async fn run(&self, request: &OperationRequest, deadline: Duration) -> Result<AttemptResult<OperationPayload>, BridgeError> {
        let result = match request {
            OperationRequest::Discover => {
                let discover = async {
                    let devices = self.reader.discover_devices().await?;
                    Ok::<_, ReaderError>((!devices.is_empty()).then_some(OperationPayload::Devices(devices)))
                };
                run_with_deadline(discover, deadline).await?
            }
            OperationRequest::ReadIdentifier(device) => {
                let read = async {
                    let tag = self.reader.read_identifier(device).await?;
                    Ok::<_, ReaderError>(tag.map(OperationPayload::Tag))
                };
                run_with_deadline(read, deadline).await?
            }
        };
        debug!("{} finished: {:?}", request, result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{DeviceHandle, OperationOutcome, TagId};
    use crate::reader::{SimulatedReader, SimulatedResponse};
    use tokio::time::Instant;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn read_request() -> OperationRequest {
        OperationRequest::ReadIdentifier(DeviceHandle::new("sim-0"))
    }

    #[tokio::test(start_paused = true)]
    async fn fast_operation_wins_the_race() {
        let result = run_with_deadline(async {
            tokio::time::sleep(ms(10)).await;
            Ok::<_, ReaderError>(Some(7u8))
        }, ms(100)).await.unwrap();
        assert_eq!(result, AttemptResult::Found(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operation_times_out_at_deadline() {
        let start = Instant::now();
        let result = run_with_deadline(async {
            tokio::time::sleep(ms(2000)).await;
            Ok::<_, ReaderError>(Some(()))
        }, ms(1000)).await.unwrap();
        assert_eq!(result, AttemptResult::TimedOut);
        assert!(start.elapsed() >= ms(1000) && start.elapsed() < ms(1100));
    }

    #[tokio::test]
    async fn zero_deadline_is_invalid() {
        let err = run_with_deadline(async { Ok::<_, ReaderError>(Some(())) }, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn zero_deadline_does_not_start_the_operation() {
        let reader = Arc::new(SimulatedReader::with_device("sim"));
        let op = TimedOperation::new(reader.clone());
        assert!(op.run(&read_request(), Duration::ZERO).await.is_err());
        assert_eq!(reader.read_calls(), 0);
    }

    #[tokio::test]
    async fn confirmed_absence_is_distinct_from_timeout() {
        let reader = Arc::new(SimulatedReader::with_device("sim"));
        let op = TimedOperation::new(reader);
        let result = op.run(&read_request(), ms(50)).await.unwrap();
        assert_eq!(result, AttemptResult::Absent);
        assert_eq!(result.into_outcome(), OperationOutcome::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_reader_collapses_to_not_found() {
        let reader = Arc::new(SimulatedReader::new().read_fallback(Duration::ZERO, SimulatedResponse::Hang));
        let op = TimedOperation::new(reader);
        let result = op.run(&read_request(), ms(1000)).await.unwrap();
        assert!(result.is_timed_out());
        assert_eq!(result.into_outcome(), OperationOutcome::NotFound);
    }

    #[tokio::test]
    async fn reader_error_is_reported_as_failure() {
        let reader = Arc::new(SimulatedReader::new().push_read(Duration::ZERO, SimulatedResponse::Fail("nak".into())));
        let op = TimedOperation::new(reader);
        let result = op.run(&read_request(), ms(50)).await.unwrap();
        assert_eq!(result, AttemptResult::Failed("Other error: nak".to_string()));
    }

    #[tokio::test]
    async fn tag_read_carries_identifier() {
        let reader = Arc::new(SimulatedReader::new().push_read(Duration::ZERO, SimulatedResponse::Ready(Some(TagId::from("04A1")))));
        let op = TimedOperation::new(reader);
        let outcome = op.run(&read_request(), ms(50)).await.unwrap().into_outcome();
        assert_eq!(outcome.tag(), Some(&TagId::from("04A1")));
    }

    #[tokio::test]
    async fn discovery_without_devices_is_absent() {
        let op = TimedOperation::new(Arc::new(SimulatedReader::new()));
        let result = op.run(&OperationRequest::Discover, ms(50)).await.unwrap();
        assert_eq!(result, AttemptResult::Absent);
    }
}
