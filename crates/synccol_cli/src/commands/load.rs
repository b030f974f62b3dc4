//! Load command implementation.

use serde::Serialize;
use serde_json::{Map, Value};
use synccol::{BaseCollection, Extension, SyncEngine};

/// Summary of a load run.
#[derive(Debug, Serialize)]
pub struct LoadSummary {
    /// Counter requests made.
    pub counter_requests: u64,
    /// Collections downloaded.
    pub collection_fetches: u64,
    /// Collections served from the cache after a network failure.
    pub offline_fallbacks: u64,
}

/// Runs the load command.
pub async fn run(
    engine: &SyncEngine,
    names: &[String],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = BaseCollection::new(engine.clone());
    let collections: Vec<_> = names
        .iter()
        .map(|name| base.extend_and_persist(Extension::named(name.as_str())))
        .collect();

    engine.load(false).await;

    let stats = engine.stats();
    let summary = LoadSummary {
        counter_requests: stats.counter_requests,
        collection_fetches: stats.collection_fetches,
        offline_fallbacks: stats.offline_fallbacks,
    };

    match format {
        "json" => {
            let mut output = Map::new();
            for collection in &collections {
                let records = collection.all()?;
                output.insert(
                    collection.name().to_string(),
                    serde_json::to_value(&*records.read())?,
                );
            }
            output.insert("summary".into(), serde_json::to_value(&summary)?);
            println!("{}", serde_json::to_string_pretty(&Value::Object(output))?);
        }
        _ => {
            for collection in &collections {
                let records = collection.all()?;
                println!("{} ({} records)", collection.name(), records.len());
                for record in records.read().iter() {
                    println!("  {record}");
                }
            }
            println!();
            println!(
                "{} counter requests, {} downloads, {} served from cache after errors",
                summary.counter_requests, summary.collection_fetches, summary.offline_fallbacks
            );
        }
    }

    Ok(())
}
