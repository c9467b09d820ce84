//! Checkpoint and Resume
//!
//! This example runs a three-step import that fails halfway, inspects the
//! snapshot it left behind, and resumes it as a fresh process would.
//!
//! Key concepts:
//! - A snapshot is written after every step transition
//! - Failed transactions stay on disk with their error information
//! - Resuming skips finished steps and re-attempts the failed one
//!
//! Run with: cargo run --example checkpoint_resume

use resumable::core::StepError;
use resumable::driver;
use resumable::{ExecuteOptions, FileStore, FunctionRegistry, StepBuilder, StoreConfig, TransactionLog};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn registry(upstream_down: Arc<AtomicBool>) -> FunctionRegistry {
    FunctionRegistry::new()
        .register("download", |args, _| {
            let url = args.first().and_then(|v| v.as_str()).unwrap_or("?");
            println!("  downloading {url}");
            Ok(json!(["alice", "bob", "carol"]))
        })
        .register("upload", move |_, kwargs| {
            if upstream_down.load(Ordering::SeqCst) {
                println!("  upload failed");
                return Err(StepError::new("ConnectionRefused", "upstream is down"));
            }
            let rows = kwargs["rows"].as_array().map(Vec::len).unwrap_or(0);
            println!("  uploaded {rows} rows");
            Ok(json!(rows))
        })
        .register("notify", |_, kwargs| {
            println!("  notifying: {} rows imported", kwargs["count"]);
            Ok(json!(null))
        })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Checkpoint and Resume ===\n");

    let dir = std::env::temp_dir().join("resumable-demo");
    std::fs::create_dir_all(&dir)?;
    let store = FileStore::new(StoreConfig::new(&dir).with_prefix("import"));

    let upstream_down = Arc::new(AtomicBool::new(true));
    let registry = registry(upstream_down.clone());

    println!("First run:");
    let mut log = TransactionLog::new(registry.clone());
    log.append(
        StepBuilder::call("download")
            .arg(json!("https://example.com/users.csv"))
            .returns("rows"),
    )?;
    log.append(
        StepBuilder::call("upload")
            .kwarg_from_state("rows", "rows")
            .returns("count"),
    )?;
    log.append(StepBuilder::call("notify").kwarg_from_state("count", "count"))?;

    let location = match log.execute(&store) {
        Ok(()) => {
            println!("unexpectedly succeeded");
            return Ok(());
        }
        Err(e) => {
            println!("\n{e}\n");
            log.backing_location()
                .ok_or("no snapshot written")?
                .to_path_buf()
        }
    };

    println!("Inspecting {}:\n", location.display());
    println!("{}\n", driver::inspect(&store, &location, &registry)?);

    println!("Resuming after upstream recovered:");
    upstream_down.store(false, Ordering::SeqCst);
    let resumed = driver::resume(&store, &location, &registry, ExecuteOptions::default())?;

    println!("\nFinal state: {}", resumed.state());
    println!("Snapshot removed: {}", !location.exists());
    Ok(())
}
