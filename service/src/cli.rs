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

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use tag_bridge_core::config::{DEFAULT_DISCOVERY_TIMEOUT_MS, DEFAULT_READ_ATTEMPTS, DEFAULT_READ_TIMEOUT_PER_ATTEMPT_MS};
use tag_bridge_core::{BridgeConfig, BridgeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the log level
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// IPC endpoint (socket path or pipe name); defaults to TAG_BRIDGE_IPC_ENDPOINT or the platform default
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// How long discovery waits for a reader
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_TIMEOUT_MS)]
    pub discovery_timeout_ms: u64,

    /// How many reads a wait for tag performs at most
    #[arg(long, default_value_t = DEFAULT_READ_ATTEMPTS)]
    pub read_attempts: u32,

    /// Deadline of a single read
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_PER_ATTEMPT_MS)]
    pub read_timeout_ms: u64,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

/// The service ships with a simulated reader only.
#[derive(clap::Args, Debug)]
pub struct SimulationArgs {
    /// Tag identifier the simulated reader reports
    #[arg(long, default_value = "04A1")]
    pub sim_tag: String,

    /// Number of empty reads before the tag shows up
    #[arg(long, default_value_t = 3)]
    pub sim_after: u32,

    /// Latency of every simulated read
    #[arg(long, default_value_t = 200)]
    pub sim_latency_ms: u64,

    /// Simulate a host without any reader
    #[arg(long)]
    pub sim_no_device: bool,
}

impl Cli {
    pub fn bridge_config(&self) -> Result<BridgeConfig, BridgeError> {
        BridgeConfig::from_millis(self.discovery_timeout_ms, self.read_attempts, self.read_timeout_ms)
    }
}
