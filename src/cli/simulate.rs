//! Scenario replay command handler.

use std::path::Path;

use anyhow::{Context, Result};

use plugin_status::scenario::{replay, Scenario};
use plugin_status::EngineConfig;

/// Replay a scenario file and print one JSON line per record.
pub(crate) async fn cmd_simulate(path: &Path, engine: &EngineConfig) -> Result<()> {
    let scenario = Scenario::from_path(path)
        .with_context(|| format!("Failed to load scenario {}", path.display()))?;
    let records = replay(scenario, engine)
        .await
        .context("Scenario replay failed")?;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
