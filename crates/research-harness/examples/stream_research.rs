use std::sync::Arc;

use research_harness::prelude::*;
use research_harness::vendors::openai::OpenAiBackend;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ResearchError> {
    let backend = Arc::new(OpenAiBackend::from_env()?);
    let request = ResearchRequest::new(DEFAULT_MODEL, "Summarize recent work on solid-state batteries.")
        .max_tool_calls(20);

    let run = ResearchRunBuilder::new(backend, request)
        .sink(TerminalSink::stdout())
        .start_stream()
        .await?;

    let abort = run.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let outcome = run.finish().await?;
    let usage = outcome.progress.tool_calls_observed;
    let response = outcome.into_result()?;
    println!("{}", response.text().unwrap_or_default());
    println!("tool calls observed: {usage}");
    Ok(())
}
