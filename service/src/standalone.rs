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
use std::time::Duration;

use log::{debug, error, info};
use tag_bridge_core::ipc::default_endpoint;
use tag_bridge_core::{LocalBridge, SimulatedReader, TagId, TagReader};
use tokio::runtime::Runtime;

use crate::cli::{Cli, SimulationArgs};

fn build_reader(sim: &SimulationArgs) -> Arc<dyn TagReader> {
    let latency = Duration::from_millis(sim.sim_latency_ms);
    if sim.sim_no_device {
        info!("Simulated host without reader");
        return Arc::new(SimulatedReader::new().discovery_latency(latency));
    }
    info!("Simulated reader presents tag {} after {} empty read(s)", sim.sim_tag, sim.sim_after);
    Arc::new(SimulatedReader::with_device("Simulated tag reader")
        .discovery_latency(latency)
        .tag_after(sim.sim_after, TagId::new(sim.sim_tag.clone()), latency))
}

async fn shutdown_signal() {
    debug!("Press Ctrl+C to exit");
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C signal, exiting..."),
        Err(e) => error!("Failed to listen for Ctrl+C signal: {}", e),
    }
}

pub fn run_standalone(cli: Cli) -> anyhow::Result<()> {
    let config = cli.bridge_config()?;
    let endpoint = cli.endpoint.clone().unwrap_or_else(default_endpoint);
    debug!("Starting with {:?}", config);

    let rt = Runtime::new()?;
    rt.block_on(async {
        let reader = build_reader(&cli.simulation);
        let bridge = Arc::new(LocalBridge::new(reader, config)?);

        let ipc_service = bridge.run(endpoint);
        shutdown_signal().await;

        if let Err(e) = ipc_service.shutdown().await {
            error!("Error shutting down IPC service: {}", e);
        }
        Ok::<(), anyhow::Error>(())
    })?;

    debug!("Standalone mode exited");
    Ok(())
}
