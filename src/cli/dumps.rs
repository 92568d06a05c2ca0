//! Dump artifact commands.

// Allow print_stdout/stderr in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use crate::cli::format_timestamp;
use crate::models::ArtifactId;
use crate::services::ServiceContainer;
use crate::{Error, Result};
use std::io::{self, Write};
use std::path::Path;

/// Lists dump artifacts.
pub fn cmd_dumps(container: &ServiceContainer, json: bool) -> Result<()> {
    let artifacts = container.dumps().list()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&artifacts)
                .map_err(|e| Error::storage("render_json", e))?
        );
        return Ok(());
    }

    if artifacts.is_empty() {
        println!("No dump artifacts.");
        return Ok(());
    }

    println!("Dump artifacts ({}):", artifacts.len());
    for artifact in artifacts {
        println!(
            "  {}  {:>10} bytes  job={}  {}",
            artifact.id,
            artifact.size_bytes,
            artifact.job_id,
            format_timestamp(artifact.created_at)
        );
    }
    Ok(())
}

/// Retrieves an artifact payload to a file or stdout.
pub fn cmd_dump_get(
    container: &ServiceContainer,
    artifact_id: &str,
    output: Option<&Path>,
) -> Result<()> {
    let bytes = container.dumps().retrieve(&ArtifactId::new(artifact_id))?;

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .map_err(|e| Error::storage("write_artifact", format!("{}: {e}", path.display())))?;
            println!("Wrote {} bytes to {}", bytes.len(), path.display());
        },
        None => {
            io::stdout()
                .write_all(&bytes)
                .map_err(|e| Error::storage("write_stdout", e))?;
        },
    }
    Ok(())
}

/// Purges every dump artifact after confirmation.
pub fn cmd_purge(container: &ServiceContainer, handler: &str, force: bool) -> Result<()> {
    let count = container.dumps().list()?.len();
    if count == 0 {
        println!("Nothing to purge.");
        return Ok(());
    }

    if !force {
        print!("About to delete {count} dump artifacts. This is IRREVERSIBLE. Proceed? [y/N] ");
        io::stdout()
            .flush()
            .map_err(|e| Error::storage("flush_stdout", e))?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| Error::storage("read_stdin", e))?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let purged = container.dumps().purge_all()?;

    // The dump store has no evidence id to log against; record the
    // administrative action here where the handler identity is known.
    tracing::warn!(handler, purged, "Administrative purge of all dump artifacts");
    println!("Purged {purged} artifacts.");
    Ok(())
}
