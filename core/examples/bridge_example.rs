// Minimal example of driving the TagBridge trait with LocalBridge and a simulated reader
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::info;
use tag_bridge_core::{LocalBridge, SimulatedReader, TagBridge, TagId};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // Reader reports an empty field three times, then a tag
    let reader = SimulatedReader::with_device("Example reader")
        .tag_after(3, TagId::from("04A1"), Duration::from_millis(200));

    let bridge = LocalBridge::with_default_config(Arc::new(reader))?;

    let found = bridge.find_device().await?;
    info!("Reader found: {}", found.is_found());

    match bridge.wait_for_tag().await? {
        Some(report) => info!(
            "Wait finished after {} attempt(s): {:?}",
            report.attempts,
            report.outcome.tag()
        ),
        None => info!("Wait was cancelled"),
    }

    Ok(())
}
