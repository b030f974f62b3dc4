//! Reset command implementation.

use synccol::SyncEngine;

/// Runs the reset command.
pub async fn run(engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
    engine.reset().await?;
    println!("Store {} reset", engine.storage().name());
    Ok(())
}
