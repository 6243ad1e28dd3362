use std::io::{self, Write};

use research_harness::RemoteResponse;

const RULE_WIDTH: usize = 80;

fn banner(out: &mut impl Write, title: &str) -> io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "{rule}")?;
    writeln!(out, "{title}")?;
    writeln!(out, "{rule}")
}

/// Writes the final text and, when the response lists output items, a tool
/// usage summary.
pub fn write_results(out: &mut impl Write, response: &RemoteResponse) -> io::Result<()> {
    banner(out, "RESEARCH RESULTS")?;
    writeln!(out)?;
    writeln!(out, "{}", response.text().unwrap_or_default())?;
    writeln!(out)?;

    if response.output.is_empty() {
        return Ok(());
    }
    let usage = response.tool_usage();
    banner(out, "TOOL USAGE SUMMARY")?;
    if usage.web_searches > 0 {
        writeln!(out, "Web searches: {}", usage.web_searches)?;
    }
    if usage.code_interpreter_calls > 0 {
        writeln!(out, "Code interpreter calls: {}", usage.code_interpreter_calls)?;
    }
    Ok(())
}
