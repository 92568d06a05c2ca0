//! Status and configuration commands.

// Allow print_stdout/stderr in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use crate::Result;
use crate::config::CustodianConfig;
use crate::services::ServiceContainer;
use crate::storage::CustodyStore;

/// Shows system status.
pub fn cmd_status(container: &ServiceContainer, config: &CustodianConfig) -> Result<()> {
    println!("Custodian Status");
    println!("================");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let db_path = config.db_path();
    let db_status = if db_path.exists() {
        "Available"
    } else {
        "Will be created on first use"
    };
    println!("Custody store: {db_status}");
    println!("  Path: {}", db_path.display());

    let dump_status = if config.dump_dir.exists() {
        "Available"
    } else {
        "Will be created on first use"
    };
    println!("Dump storage: {dump_status}");
    println!("  Path: {}", config.dump_dir.display());
    println!();

    let evidence_count = container.store().count_evidence()?;
    let artifact_count = container.dumps().list()?.len();
    println!("Evidence items: {evidence_count}");
    println!("Dump artifacts: {artifact_count}");

    println!();
    println!("Use 'custodian config --show' to view full configuration");
    Ok(())
}

/// Shows configuration.
pub fn cmd_config(config: &CustodianConfig, show: bool) -> Result<()> {
    if show {
        println!("Current Configuration");
        println!("=====================");
        println!();
        println!("Data Directory: {}", config.data_dir.display());
        println!("Dump Directory: {}", config.dump_dir.display());
        println!("Default Page Size: {}", config.page_size);
        println!();
        println!("Feature Flags:");
        println!("  Dedup on ingest: {}", config.features.dedup_on_ingest);
        println!();
        println!("Logging:");
        println!("  Format: {:?}", config.logging.format);
        println!(
            "  File: {}",
            config
                .logging
                .file
                .as_ref()
                .map_or_else(|| "(stderr)".to_string(), |p| p.display().to_string())
        );
        println!("  Directives: {}", config.logging.directives);
    } else {
        println!("Use --show to display configuration");
    }
    Ok(())
}
