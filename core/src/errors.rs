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

use std::io;
use thiserror::Error;

use crate::definitions::PollId;

/// Errors rejected at request-acceptance time, before any timer starts.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Already waiting for tag ({0})")]
    AlreadyPolling(PollId),

    #[error("No device bound, discovery has not succeeded yet")]
    NoDeviceBound,

    #[error("Poll {0} is not active")]
    UnknownPoll(PollId),
}

/// Errors reported by a reader backend.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Other error: {0}")]
    Other(String),
}

impl From<String> for ReaderError {
    fn from(other: String) -> Self {
        ReaderError::Other(other)
    }
}

impl From<&str> for ReaderError {
    fn from(other: &str) -> Self {
        ReaderError::Other(other.to_string())
    }
}
