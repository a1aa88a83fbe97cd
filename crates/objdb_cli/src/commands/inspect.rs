//! Inspect command implementation.

use crate::sample;
use objdb_core::{Config, Store, StoreStats};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Last committed sequence number.
    pub committed_seq: u64,
    /// Commit log size in bytes.
    pub log_bytes: u64,
    /// Per-type live object counts.
    pub types: Vec<TypeStats>,
}

/// Object count for one entity type.
#[derive(Debug, Serialize)]
pub struct TypeStats {
    /// Entity type name.
    pub name: String,
    /// Number of live objects.
    pub objects: usize,
}

impl InspectResult {
    fn new(path: &Path, stats: StoreStats) -> Self {
        Self {
            path: path.display().to_string(),
            committed_seq: stats.committed_seq.as_u64(),
            log_bytes: stats.log_bytes,
            types: stats
                .objects
                .into_iter()
                .map(|(name, objects)| TypeStats { name, objects })
                .collect(),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Opens an existing store created by the demo and summarizes it.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let config = Config::default().create_if_missing(false);
    let store = Store::open_with_config(path, sample::schema()?, config)?;
    Ok(InspectResult::new(path, store.stats()?))
}

fn print_text_output(result: &InspectResult) {
    println!("ObjDB Store: {}", result.path);
    println!("================================");
    println!("Committed sequence: {}", result.committed_seq);
    println!("Commit log size:    {} bytes", result.log_bytes);
    println!();
    println!("Objects:");
    for t in &result.types {
        println!("  {:<12} {}", t.name, t.objects);
    }
}
