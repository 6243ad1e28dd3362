//! Command-line client for deep research runs.
//!
//! Streams progress by default; `--no-stream` polls a background run and
//! `--no-background` waits on a synchronous request.

mod cli;
mod observability;
mod query;
mod report;

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser as _;
use research_harness::vendors::openai::{OpenAiBackend, OpenAiClientConfig};
use research_harness::{
    DEFAULT_POLL_INTERVAL, RemoteResponse, ResearchBackend, ResearchError, ResearchRequest,
    ResearchRunBuilder, ResponseStatus, ResultResolver, RunOptions, TerminalSink,
};
use tracing::{info, warn};

use crate::cli::{Cli, Mode};

/// Conventional exit status for a SIGINT-terminated process.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    observability::init_observability();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = OpenAiClientConfig::from_env()?;
    let backend: Arc<dyn ResearchBackend> =
        Arc::new(OpenAiBackend::new(config).context("failed to create OpenAI client")?);

    let Some(source) = cli.query_source() else {
        anyhow::bail!("No query provided. Use a query argument, --input-file, or --interactive");
    };
    if let query::QuerySource::Interactive = source {
        println!("Enter your research query (press Ctrl+D when done):");
    }
    let query = query::read_query(&source, std::io::stdin().lock())?;
    if let query::QuerySource::File(path) = &source {
        println!("Loaded query from {}", path.display());
    }

    let mode = cli.mode();
    let request = ResearchRequest::new(cli.model.as_str(), query)
        .tools(cli.tools()?)
        .max_tool_calls(cli.max_tool_calls)
        .background(mode != Mode::Synchronous);
    request.validate()?;

    println!("Starting research with {}...", request.model);
    println!("Query: {}\n", request.input);
    info!(model = %request.model, ?mode, "submitting research request");

    let response = match mode {
        Mode::Stream => match stream(backend, request).await? {
            Some(response) => response,
            None => return Ok(ExitCode::from(EXIT_INTERRUPTED)),
        },
        Mode::Poll => match poll(backend, &request).await? {
            Some(response) => response,
            None => return Ok(ExitCode::from(EXIT_INTERRUPTED)),
        },
        Mode::Synchronous => backend
            .create(&request)
            .await
            .context("research request failed")?,
    };

    if response.status != ResponseStatus::Completed {
        eprintln!("Error: Research failed with status: {}", response.status);
        return Ok(ExitCode::FAILURE);
    }
    let mut stdout = std::io::stdout().lock();
    report::write_results(&mut stdout, &response)?;
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

/// Streams the run with a live panel. `None` means the user interrupted it.
async fn stream(
    backend: Arc<dyn ResearchBackend>,
    request: ResearchRequest,
) -> anyhow::Result<Option<RemoteResponse>> {
    let run = ResearchRunBuilder::new(backend, request)
        .sink(TerminalSink::stdout())
        .start_stream()
        .await?;

    let abort = run.abort_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });
    let outcome = run.finish().await;
    ctrl_c.abort();
    let outcome = outcome?;

    if outcome.resolved_by_fallback {
        info!(run_id = ?outcome.run_id, "final response retrieved after stream ended");
    }
    match outcome.into_result() {
        Ok(response) => Ok(Some(response)),
        Err(ResearchError::Cancelled) => {
            eprintln!("\nResearch interrupted by user");
            Ok(None)
        }
        Err(ResearchError::RemoteRunFailure { run_id, status }) => Ok(Some(RemoteResponse {
            id: run_id,
            status,
            ..RemoteResponse::default()
        })),
        Err(err) => Err(err.into()),
    }
}

/// Creates a background run and polls it until it finishes. `None` means the
/// user interrupted it.
async fn poll(
    backend: Arc<dyn ResearchBackend>,
    request: &ResearchRequest,
) -> anyhow::Result<Option<RemoteResponse>> {
    let created = backend
        .create(request)
        .await
        .context("research request failed")?;
    let run_id = created.id.clone();
    println!("Research started in background (ID: {run_id})");
    println!("Polling for completion...");

    let resolver = ResultResolver::new(backend.clone());
    let polled = resolver.poll_until_terminal_with(created, DEFAULT_POLL_INTERVAL, |r| {
        println!("Status: {}", r.status);
    });
    tokio::select! {
        response = polled => {
            let response = response.context("failed to retrieve research status")?;
            println!("\nFinal status: {}\n", response.status);
            Ok(Some(response))
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nResearch interrupted by user");
            cancel_with_timeout(backend.as_ref(), &run_id, RunOptions::default().cancel_timeout)
                .await;
            Ok(None)
        }
    }
}

/// Best-effort cancel of a polled run, bounded by `timeout`.
async fn cancel_with_timeout(backend: &dyn ResearchBackend, run_id: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, backend.cancel(run_id)).await {
        Ok(Ok(response)) => {
            info!(run_id, status = %response.status, "research cancelled");
            true
        }
        Ok(Err(err)) => {
            warn!(run_id, error = %err, "cancel request failed");
            false
        }
        Err(_) => {
            warn!(run_id, timeout_ms = timeout.as_millis() as u64, "cancel request timed out");
            false
        }
    }
}
