//! Check command implementation.

use std::collections::BTreeMap;
use synccol::{SyncEngine, SyncResult};

/// Compares the stored counter of every named collection with the remote
/// one. Nothing is downloaded or written.
pub async fn counters(
    engine: &SyncEngine,
    names: &[String],
) -> SyncResult<BTreeMap<String, bool>> {
    let mut results = BTreeMap::new();
    for name in names {
        results.insert(name.clone(), engine.check_counter(name).await?);
    }
    Ok(results)
}

/// Runs the check command.
pub async fn run(engine: &SyncEngine, names: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let results = counters(engine, names).await?;
    let mut stale = 0;
    for (name, up_to_date) in &results {
        if *up_to_date {
            println!("{name}: up to date");
        } else {
            stale += 1;
            println!("{name}: stale");
        }
    }

    if stale > 0 {
        return Err(format!("{stale} collection(s) out of date").into());
    }
    Ok(())
}
