//! Evidence lifecycle commands.

// Allow print_stdout/stderr in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use crate::cli::format_timestamp;
use crate::models::{
    CustodyAction, EvidenceFilter, EvidenceId, EvidenceKind, EvidenceState, EventFilter,
    PageRequest, RegisterRequest, SortDir, SortKey,
};
use crate::services::{DeleteOutcome, ServiceContainer};
use crate::{Error, Result};
use std::path::Path;

/// Registers a file's content as evidence.
pub fn cmd_ingest(
    container: &ServiceContainer,
    path: &Path,
    kind: EvidenceKind,
    handler: &str,
    location: &str,
    notes: Option<String>,
    dedup: bool,
) -> Result<()> {
    let content = std::fs::read(path)
        .map_err(|e| Error::storage("read_evidence_file", format!("{}: {e}", path.display())))?;

    let item = container.registry().register(RegisterRequest {
        kind,
        content,
        handler: handler.to_string(),
        location: location.to_string(),
        source: Some(path.display().to_string()),
        notes,
        dedup,
    })?;

    println!("Evidence registered:");
    println!("  ID:    {}", item.id);
    println!("  Kind:  {}", item.kind);
    println!("  Hash:  sha256:{}", item.content_hash);
    println!("  Size:  {} bytes", item.size_bytes);
    println!("  State: {}", item.state);
    Ok(())
}

/// Lists evidence, paginated.
#[allow(clippy::fn_params_excessive_bools, clippy::too_many_arguments)]
pub fn cmd_list(
    container: &ServiceContainer,
    page: usize,
    page_size: usize,
    kind: Option<EvidenceKind>,
    state: Option<EvidenceState>,
    flagged: Option<bool>,
    oldest_first: bool,
    by_size: bool,
    json: bool,
) -> Result<()> {
    let mut filter = EvidenceFilter::new();
    if let Some(kind) = kind {
        filter = filter.with_kind(kind);
    }
    if let Some(state) = state {
        filter = filter.with_state(state);
    }
    if let Some(flagged) = flagged {
        filter = filter.with_flagged(flagged);
    }

    let key = if by_size {
        SortKey::Size
    } else {
        SortKey::Timestamp
    };
    let dir = if oldest_first {
        SortDir::Asc
    } else {
        SortDir::Desc
    };

    let result =
        container
            .query()
            .evidence_page(&filter, &PageRequest::new(page, page_size), key, dir)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).map_err(|e| Error::storage("render_json", e))?
        );
        return Ok(());
    }

    println!(
        "Evidence (page {} of {}, {} total):",
        result.page,
        result.page_count().max(1),
        result.total_count
    );
    println!();
    for item in &result.items {
        let flagged = match item.flagged {
            Some(true) => " [FLAGGED]",
            _ => "",
        };
        println!(
            "  {}  {:<11} {:<10} {:>10}  {}{}",
            item.id,
            item.kind,
            item.state,
            item.size_bytes,
            format_timestamp(item.uploaded_at),
            flagged
        );
    }
    Ok(())
}

/// Prints the chain of custody for an evidence id.
pub fn cmd_history(
    container: &ServiceContainer,
    id: &str,
    action: Option<CustodyAction>,
    page: usize,
    page_size: usize,
    json: bool,
) -> Result<()> {
    let id = EvidenceId::new(id);
    let filter = action.map_or_else(EventFilter::new, |a| EventFilter::new().with_action(a));

    let result = container
        .query()
        .custody_page(&id, &filter, &PageRequest::new(page, page_size))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).map_err(|e| Error::storage("render_json", e))?
        );
        return Ok(());
    }

    println!("Chain of custody for {id} ({} events):", result.total_count);
    println!();
    for event in &result.items {
        println!(
            "  #{:<4} {:<8} {}  handler={} location={}",
            event.seq,
            event.action,
            format_timestamp(event.timestamp),
            event.handler,
            event.location
        );
        if let Some(notes) = &event.notes {
            println!("        {notes}");
        }
    }
    Ok(())
}

/// Begins analysis on an evidence item.
pub fn cmd_analyze(
    container: &ServiceContainer,
    id: &str,
    handler: &str,
    location: &str,
) -> Result<()> {
    let item = container
        .registry()
        .begin_analysis(&EvidenceId::new(id), handler, location)?;
    println!("Analysis started: {} is now {}", item.id, item.state);
    Ok(())
}

/// Completes analysis, storing the engine's result verbatim.
pub fn cmd_complete(
    container: &ServiceContainer,
    id: &str,
    result: &str,
    flagged: bool,
    handler: &str,
    location: &str,
) -> Result<()> {
    let result: serde_json::Value = serde_json::from_str(result)
        .map_err(|e| Error::storage("parse_analysis_result", e))?;

    let item = container.registry().complete_analysis(
        &EvidenceId::new(id),
        &result,
        flagged,
        handler,
        location,
    )?;
    println!(
        "Analysis completed: {} is now {}{}",
        item.id,
        item.state,
        if flagged { " [FLAGGED]" } else { "" }
    );
    Ok(())
}

/// Deletes one or more evidence items, reporting per-id outcomes.
pub fn cmd_delete(
    container: &ServiceContainer,
    ids: &[EvidenceId],
    handler: &str,
    location: &str,
) -> Result<()> {
    if ids.is_empty() {
        println!("No evidence IDs provided. Usage: custodian delete <ID>...");
        return Ok(());
    }

    let outcomes = container.registry().delete_batch(ids, handler, location);

    let mut deleted = 0;
    for (id, outcome) in &outcomes {
        match outcome {
            Ok(DeleteOutcome::Deleted) => {
                deleted += 1;
                println!("  deleted        {id}");
            },
            Ok(DeleteOutcome::AlreadyDeleted) => println!("  already-deleted {id}"),
            Err(e) => println!("  failed          {id}: {e}"),
        }
    }
    println!();
    println!("Deleted {deleted} of {} items.", outcomes.len());
    Ok(())
}

/// Records a VIEW event.
pub fn cmd_view(
    container: &ServiceContainer,
    id: &str,
    handler: &str,
    location: &str,
    notes: Option<String>,
) -> Result<()> {
    let event =
        container
            .registry()
            .record_view(&EvidenceId::new(id), handler, location, notes)?;
    println!("Recorded VIEW #{} for {}", event.seq, event.evidence_id);
    Ok(())
}

/// Attaches an investigator annotation (MODIFY event).
pub fn cmd_annotate(
    container: &ServiceContainer,
    id: &str,
    handler: &str,
    location: &str,
    notes: &str,
) -> Result<()> {
    let event = container
        .registry()
        .annotate(&EvidenceId::new(id), handler, location, notes)?;
    println!("Recorded MODIFY #{} for {}", event.seq, event.evidence_id);
    Ok(())
}
