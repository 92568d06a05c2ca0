//! Capture and timed-analysis commands.

// Allow print_stdout/stderr in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use crate::models::{JobId, JobState};
use crate::services::ServiceContainer;
use crate::{Error, Result};

/// Captures a process immediately and waits for the result.
pub async fn cmd_capture(
    container: &ServiceContainer,
    pid: u32,
    handler: &str,
    location: &str,
    notes: Option<String>,
) -> Result<()> {
    let job_id = container
        .scheduler()
        .start_capture(pid, handler, location, notes)?;
    println!("Capture started: job {job_id}");

    let Some(job) = container.scheduler().wait(&job_id).await else {
        return Err(Error::storage("await_capture", "job record disappeared"));
    };

    match job.state {
        JobState::Completed => {
            println!("Capture completed:");
            if let Some(evidence_id) = &job.evidence_id {
                println!("  Evidence: {evidence_id}");
            }
            if let Some(artifact_id) = &job.artifact_id {
                println!("  Artifact: {artifact_id}");
            }
        },
        _ => {
            println!(
                "Capture {}: {}",
                job.state,
                job.failure.as_deref().unwrap_or("no details")
            );
        },
    }
    Ok(())
}

/// Runs a timed analysis to completion (or Ctrl-C, which cancels it).
pub async fn cmd_watch(
    container: &ServiceContainer,
    pid: u32,
    duration_secs: u64,
    interval_secs: u64,
    handler: &str,
    location: &str,
) -> Result<()> {
    let scheduler = container.scheduler().clone();
    let job_id =
        scheduler.start_timed_analysis(pid, duration_secs, interval_secs, handler, location)?;
    println!("Timed analysis started: job {job_id} ({duration_secs}s @ {interval_secs}s)");

    // Ctrl-C cancels the sampling loop instead of killing the process, so
    // the partial timeline still lands in the evidentiary record.
    let cancel_id = job_id.clone();
    let cancel_scheduler = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_scheduler.cancel(&cancel_id);
        }
    });

    let Some(job) = scheduler.wait(&job_id).await else {
        return Err(Error::storage("await_analysis", "job record disappeared"));
    };

    println!(
        "Analysis {}: {} samples",
        job.state, job.samples_collected
    );
    if let Some(evidence_id) = &job.evidence_id {
        println!("  Evidence: {evidence_id}");
    }
    if let Some(failure) = &job.failure {
        println!("  Failure:  {failure}");
    }
    Ok(())
}

/// Lists capture jobs.
pub fn cmd_jobs(container: &ServiceContainer, json: bool) -> Result<()> {
    let jobs = container.scheduler().jobs();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&jobs).map_err(|e| Error::storage("render_json", e))?
        );
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No capture jobs in this session.");
        return Ok(());
    }

    println!("Capture jobs:");
    for job in jobs {
        println!(
            "  {}  pid={:<7} {:<14} {:<9} samples={}",
            job.id,
            job.pid,
            job.kind.as_str(),
            job.state,
            job.samples_collected
        );
    }
    Ok(())
}

/// Cancels a running timed analysis.
pub fn cmd_cancel(container: &ServiceContainer, job_id: &str) -> Result<()> {
    if container.scheduler().cancel(&JobId::new(job_id)) {
        println!("Cancellation requested for {job_id}");
    } else {
        println!("Job {job_id} is not cancellable (unknown, terminal, or an immediate capture)");
    }
    Ok(())
}

/// Lists running processes visible to the probe.
pub fn cmd_processes(container: &ServiceContainer, limit: usize) -> Result<()> {
    let processes = container.probe().processes()?;

    println!("{:<8} {:<24} {:>12} {:>8}  STATE", "PID", "NAME", "RSS", "THREADS");
    for info in processes.iter().take(limit) {
        println!(
            "{:<8} {:<24} {:>12} {:>8}  {}",
            info.pid,
            info.name,
            info.rss_bytes,
            info.threads,
            info.state
        );
    }
    Ok(())
}
