pub mod definitions;
pub mod config;
pub mod errors;
pub mod reader;
pub mod session;
pub mod timed_operation;
pub mod poll_controller;
pub mod discovery;
pub mod bridge;
pub mod service;
pub mod ipc;

pub use bridge::{LocalBridge, TagBridge};
pub use config::{BridgeConfig, ConfigSnapshot};
pub use definitions::{AttemptResult, DeviceHandle, OperationOutcome, OperationPayload, OperationRequest, PollId, PollReport, TagId};
pub use discovery::discover;
pub use errors::{BridgeError, ReaderError};
pub use ipc::IpcServer;
pub use poll_controller::{PollController, PollEvent, PollHandle, PollPhase};
pub use reader::{SimulatedReader, SimulatedResponse, TagReader};
pub use service::{spawn_service, ServiceHandle, StopHandle};
pub use session::Session;
pub use timed_operation::{run_with_deadline, TimedOperation};
