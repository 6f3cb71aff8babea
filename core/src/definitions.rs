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

use std::fmt;
use std::time::Duration;

/// Identifier read from a tag, kept exactly as the reader reported it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagId(pub String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque reference to a discovered reader device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    pub id: String,
    pub name: Option<String>,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), name: None }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: Some(name.into()) }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{}\" ({})", name, self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Device action to perform within a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    /// Enumerate readers and bind the first one found.
    Discover,
    /// Read the identifier of the tag currently presented to the given reader.
    ReadIdentifier(DeviceHandle),
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationRequest::Discover => f.write_str("discover"),
            OperationRequest::ReadIdentifier(device) => write!(f, "read identifier from {}", device),
        }
    }
}

/// Result of a single attempt, before it is collapsed into an [`OperationOutcome`].
///
/// Timeouts, confirmed absence and driver failures are kept apart here so that
/// callers interested in diagnostics can tell them from each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult<T> {
    /// The device satisfied the request.
    Found(T),
    /// The device answered, but nothing was there.
    Absent,
    /// The deadline elapsed before the device answered.
    TimedOut,
    /// The device layer reported an error.
    Failed(String),
}

impl<T> AttemptResult<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, AttemptResult::Found(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, AttemptResult::TimedOut)
    }
}

impl AttemptResult<OperationPayload> {
    /// Collapses the attempt into what callers see: anything but `Found` is `NotFound`.
    pub fn into_outcome(self) -> OperationOutcome {
        match self {
            AttemptResult::Found(OperationPayload::Tag(tag)) => OperationOutcome::Found(Some(tag)),
            AttemptResult::Found(OperationPayload::Devices(_)) => OperationOutcome::Found(None),
            _ => OperationOutcome::NotFound,
        }
    }
}

/// What a successful attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationPayload {
    Devices(Vec<DeviceHandle>),
    Tag(TagId),
}

/// Terminal result delivered to the caller of a poll or a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Carries the tag identifier for reads, nothing for discovery.
    Found(Option<TagId>),
    NotFound,
}

impl OperationOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, OperationOutcome::Found(_))
    }

    pub fn tag(&self) -> Option<&TagId> {
        match self {
            OperationOutcome::Found(tag) => tag.as_ref(),
            OperationOutcome::NotFound => None,
        }
    }
}

/// Identifier of a poll accepted by the [`PollController`](crate::poll_controller::PollController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollId(pub u64);

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll#{}", self.0)
    }
}

/// Final outcome of a poll together with what it took to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: OperationOutcome,
    /// Number of attempts that were started.
    pub attempts: u32,
    /// How many of those attempts ended because the deadline elapsed.
    pub timeouts: u32,
    pub elapsed: Duration,
}
