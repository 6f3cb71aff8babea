pub mod server;

pub use server::{default_endpoint, IpcServer, ENDPOINT_ENV_VAR};
